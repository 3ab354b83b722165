// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Emulation of the PDF graphics-state stack.
//!
//! The serializer walks entries in order and asks this stack for the minimal
//! operators that bring the real PDF state in line with each entry's
//! snapshot. A clip is only ever removed with `Q`, so every clip gets its own
//! `q` level, and every non-identity transform a level above it.

use alloc::vec::Vec;

use kurbo::Affine;
use smallvec::SmallVec;
use vellum_imaging::{ClipShape, ClipState};

use crate::ops;
use crate::resources::ResourceIndex;
use crate::snapshot::{GraphicsStateSnapshot, TextState};

#[derive(Clone, Debug)]
struct StackEntry {
    transform: Affine,
    clip: ClipState,
    color: [u8; 3],
    shader: Option<ResourceIndex>,
    graphic_state: Option<ResourceIndex>,
    text: TextState,
}

/// Tracks what the PDF graphics state holds while content is written.
#[derive(Clone, Debug)]
pub(crate) struct GraphicStackState {
    entries: SmallVec<[StackEntry; 4]>,
    max_depth: usize,
}

impl GraphicStackState {
    /// Stack at the initial PDF state, with `base_clip` as the clip already
    /// in effect.
    pub(crate) fn new(base_clip: ClipState, max_depth: usize) -> Self {
        let mut entries = SmallVec::new();
        entries.push(StackEntry {
            transform: Affine::IDENTITY,
            clip: base_clip,
            color: [0, 0, 0],
            shader: None,
            graphic_state: None,
            text: TextState::default(),
        });
        Self { entries, max_depth }
    }

    /// Number of outstanding `q`.
    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.entries.len() - 1
    }

    fn current(&mut self) -> &mut StackEntry {
        self.entries.last_mut().expect("stack keeps its base entry")
    }

    fn push(&mut self, out: &mut Vec<u8>) {
        assert!(
            self.depth() < self.max_depth,
            "graphics state stack overflow"
        );
        let top = self.current().clone();
        self.entries.push(top);
        ops::append_save(out);
    }

    fn pop(&mut self, out: &mut Vec<u8>) {
        assert!(self.depth() > 0, "graphics state stack underflow");
        self.entries.pop();
        ops::append_restore(out);
    }

    /// Bring the clip in line with `clip`.
    pub(crate) fn update_clip(&mut self, clip: &ClipState, out: &mut Vec<u8>) {
        if self.current().clip == *clip {
            return;
        }
        while self.depth() > 0 {
            self.pop(out);
            if self.current().clip == *clip {
                return;
            }
        }
        self.push(out);
        for element in clip.elements() {
            match &element.shape {
                ClipShape::Rect(rect) => {
                    ops::append_rect(out, *rect);
                    ops::append_clip(out, peniko::Fill::NonZero);
                }
                ClipShape::Path { path, fill_rule } => {
                    ops::append_path(out, path);
                    ops::append_clip(out, *fill_rule);
                }
            }
        }
        self.current().clip = clip.clone();
    }

    /// Bring the transform in line with `transform`.
    pub(crate) fn update_matrix(&mut self, transform: Affine, out: &mut Vec<u8>) {
        if self.current().transform == transform {
            return;
        }
        if self.current().transform != Affine::IDENTITY {
            self.pop(out);
            if self.current().transform == transform {
                return;
            }
        }
        if transform == Affine::IDENTITY {
            return;
        }
        self.push(out);
        ops::append_transform(out, transform);
        self.current().transform = transform;
    }

    /// Bring colour or pattern, graphics state and text state in line with
    /// `state`.
    pub(crate) fn update_drawing_state(
        &mut self,
        state: &GraphicsStateSnapshot,
        out: &mut Vec<u8>,
    ) {
        let current = self.current();
        // A pattern replaces the colour, so only one of the two is set.
        if let Some(shader) = state.shader {
            if current.shader != Some(shader) {
                ops::append_pattern(out, shader);
                current.shader = Some(shader);
            }
        } else if current.shader.is_some() || current.color != state.color {
            ops::append_color(out, state.color);
            current.color = state.color;
            current.shader = None;
        }

        if current.graphic_state != Some(state.graphic_state) {
            ops::append_graphic_state(out, state.graphic_state);
            current.graphic_state = Some(state.graphic_state);
        }

        if let Some(text) = state.text {
            if current.text.scale_x != text.scale_x {
                ops::append_text_scale(out, text.scale_x.get());
                current.text.scale_x = text.scale_x;
            }
            if current.text.render_mode != text.render_mode {
                ops::append_render_mode(out, text.render_mode.operand());
                current.text.render_mode = text.render_mode;
            }
        }
    }

    /// Pop every outstanding level.
    pub(crate) fn drain(&mut self, out: &mut Vec<u8>) {
        while self.depth() > 0 {
            self.pop(out);
        }
    }
}
