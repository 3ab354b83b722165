// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graphics-state snapshots and the reuse decision.

use kurbo::Affine;
use vellum_imaging::{ClipState, PaintStyle};

use crate::graphic_state::Scalar;
use crate::resources::ResourceIndex;

/// Text rendering mode (`Tr`).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TextRenderMode {
    /// `0 Tr`
    #[default]
    Fill,
    /// `1 Tr`
    Stroke,
    /// `2 Tr`
    FillStroke,
}

impl TextRenderMode {
    /// Operand of `Tr`.
    pub fn operand(self) -> u8 {
        match self {
            Self::Fill => 0,
            Self::Stroke => 1,
            Self::FillStroke => 2,
        }
    }
}

impl From<PaintStyle> for TextRenderMode {
    fn from(style: PaintStyle) -> Self {
        match style {
            PaintStyle::Fill => Self::Fill,
            PaintStyle::Stroke => Self::Stroke,
            PaintStyle::FillAndStroke => Self::FillStroke,
        }
    }
}

/// Text parameters that live in the graphics state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TextState {
    /// Horizontal scale (1 = unscaled).
    pub scale_x: Scalar,
    /// Rendering mode.
    pub render_mode: TextRenderMode,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            scale_x: Scalar::new(1.0),
            render_mode: TextRenderMode::Fill,
        }
    }
}

/// Everything that decides whether two draws can share a content entry.
///
/// Equality of every field licenses reuse. Clips compare by generation.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphicsStateSnapshot {
    /// Local-to-device transform.
    pub transform: Affine,
    /// Device-space clip.
    pub clip: ClipState,
    /// Flat colour, 8-bit RGB.
    pub color: [u8; 3],
    /// Shading pattern, which replaces the colour.
    pub shader: Option<ResourceIndex>,
    /// `ExtGState` resource.
    pub graphic_state: ResourceIndex,
    /// Text parameters, for glyph runs.
    pub text: Option<TextState>,
}

/// Outcome of comparing a candidate against the chain tail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntryDecision {
    /// Append to the tail.
    Reuse,
    /// Open a new entry.
    New,
}

/// Decide whether `candidate` can be appended to `tail`.
pub fn compare(
    candidate: &GraphicsStateSnapshot,
    tail: Option<&GraphicsStateSnapshot>,
) -> EntryDecision {
    match tail {
        Some(tail) if tail == candidate => EntryDecision::Reuse,
        _ => EntryDecision::New,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;
    use vellum_imaging::ClipElement;

    fn snapshot() -> GraphicsStateSnapshot {
        GraphicsStateSnapshot {
            transform: Affine::IDENTITY,
            clip: ClipState::wide_open(Rect::new(0.0, 0.0, 100.0, 100.0)),
            color: [255, 0, 0],
            shader: None,
            graphic_state: ResourceIndex::new(0),
            text: None,
        }
    }

    #[test]
    fn identical_snapshots_reuse() {
        assert_eq!(compare(&snapshot(), Some(&snapshot())), EntryDecision::Reuse);
        assert_eq!(compare(&snapshot(), None), EntryDecision::New);
    }

    #[test]
    fn any_field_change_opens_new_entry() {
        let base = snapshot();
        let variants = [
            GraphicsStateSnapshot {
                transform: Affine::translate((1.0, 0.0)),
                ..snapshot()
            },
            GraphicsStateSnapshot {
                clip: base.clip.intersect(ClipElement::rect(Rect::new(0.0, 0.0, 1.0, 1.0))),
                ..snapshot()
            },
            GraphicsStateSnapshot {
                color: [0, 0, 0],
                ..snapshot()
            },
            GraphicsStateSnapshot {
                shader: Some(ResourceIndex::new(0)),
                ..snapshot()
            },
            GraphicsStateSnapshot {
                graphic_state: ResourceIndex::new(1),
                ..snapshot()
            },
            GraphicsStateSnapshot {
                text: Some(TextState::default()),
                ..snapshot()
            },
        ];
        for variant in &variants {
            assert_eq!(compare(variant, Some(&base)), EntryDecision::New);
        }
    }
}
