// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canvas state queries and a save/restore stack.

use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Rect, Shape};
use peniko::Fill;

use crate::{ClipElement, ClipState};

/// Read access to the transform and clip a host canvas currently has in
/// effect.
///
/// The PDF device never owns canvas state; it asks through this trait for
/// every draw call.
pub trait CanvasState {
    /// Local-to-device transform.
    fn transform(&self) -> Affine;

    /// Device-space clip.
    fn clip(&self) -> &ClipState;
}

/// A fixed transform and clip.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawContext {
    /// Local-to-device transform.
    pub transform: Affine,
    /// Device-space clip.
    pub clip: ClipState,
}

impl DrawContext {
    /// Identity transform, wide-open clip over `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self {
            transform: Affine::IDENTITY,
            clip: ClipState::wide_open(bounds),
        }
    }
}

impl CanvasState for DrawContext {
    fn transform(&self) -> Affine {
        self.transform
    }

    fn clip(&self) -> &ClipState {
        &self.clip
    }
}

/// Save/restore stack of transforms and clips.
///
/// Every clip operation produces a clip with a new generation, so repeated
/// draws under the same clip compare equal and draws under different clips
/// never do, even across stacks.
#[derive(Clone, Debug)]
pub struct CanvasStack {
    transform: Affine,
    clip: ClipState,
    saved: Vec<(Affine, ClipState)>,
}

impl CanvasStack {
    /// Create a stack whose base clip is wide open over `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self {
            transform: Affine::IDENTITY,
            clip: ClipState::wide_open(bounds),
            saved: Vec::new(),
        }
    }

    /// Number of outstanding saves.
    #[inline]
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Push the current transform and clip.
    pub fn save(&mut self) {
        self.saved.push((self.transform, self.clip.clone()));
    }

    /// Pop the most recent save.
    ///
    /// Returns the restored clip if it differs from the clip that was in
    /// effect, which is what a device needs for `invalidate_clip`. Restoring
    /// with no outstanding save does nothing.
    pub fn restore(&mut self) -> Option<ClipState> {
        let (transform, clip) = self.saved.pop()?;
        self.transform = transform;
        let changed = clip != self.clip;
        self.clip = clip;
        changed.then(|| self.clip.clone())
    }

    /// Replace the transform.
    pub fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    /// Pre-multiply `transform` into the current transform.
    pub fn concat(&mut self, transform: Affine) {
        self.transform *= transform;
    }

    /// Intersect the clip with a local-space rectangle.
    pub fn clip_rect(&mut self, rect: Rect) {
        let [_, b, c, _, _, _] = self.transform.as_coeffs();
        let element = if b == 0.0 && c == 0.0 {
            ClipElement::rect(self.transform.transform_rect_bbox(rect))
        } else {
            ClipElement::path(self.transform * rect.to_path(0.1), Fill::NonZero)
        };
        self.push_clip(element);
    }

    /// Intersect the clip with a local-space path.
    pub fn clip_path(&mut self, path: &BezPath, fill_rule: Fill) {
        self.push_clip(ClipElement::path(self.transform * path.clone(), fill_rule));
    }

    fn push_clip(&mut self, element: ClipElement) {
        self.clip = self.clip.intersect(element);
    }
}

impl CanvasState for CanvasStack {
    fn transform(&self) -> Affine {
        self.transform
    }

    fn clip(&self) -> &ClipState {
        &self.clip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClipShape;

    const PAGE: Rect = Rect::new(0.0, 0.0, 200.0, 100.0);

    #[test]
    fn scaled_rect_clip_stays_rectangular() {
        let mut canvas = CanvasStack::new(PAGE);
        canvas.concat(Affine::scale(2.0));
        canvas.clip_rect(Rect::new(5.0, 5.0, 10.0, 10.0));
        assert_eq!(canvas.clip().as_exact_rect(), Some(Rect::new(10.0, 10.0, 20.0, 20.0)));
    }

    #[test]
    fn rotated_rect_clip_becomes_path() {
        let mut canvas = CanvasStack::new(PAGE);
        canvas.concat(Affine::rotate(0.5));
        canvas.clip_rect(Rect::new(5.0, 5.0, 10.0, 10.0));
        assert!(matches!(
            canvas.clip().elements()[0].shape,
            ClipShape::Path { .. }
        ));
    }

    #[test]
    fn each_clip_gets_a_new_generation() {
        let mut canvas = CanvasStack::new(PAGE);
        canvas.clip_rect(PAGE);
        let first = canvas.clip().clone();
        canvas.clip_rect(PAGE);
        assert_ne!(&first, canvas.clip());
        assert!(first.generation() > 0);
    }

    #[test]
    fn stacks_never_share_a_clip() {
        let mut a = CanvasStack::new(PAGE);
        let mut b = CanvasStack::new(PAGE);
        assert_eq!(a.clip(), b.clip());
        a.clip_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        b.clip_rect(Rect::new(50.0, 50.0, 60.0, 60.0));
        assert_ne!(a.clip(), b.clip());
    }

    #[test]
    fn restore_reports_clip_changes_only() {
        let mut canvas = CanvasStack::new(PAGE);
        canvas.save();
        canvas.concat(Affine::translate((1.0, 1.0)));
        assert_eq!(canvas.restore(), None);
        assert_eq!(canvas.transform(), Affine::IDENTITY);

        canvas.save();
        canvas.clip_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let parent = canvas.restore();
        assert_eq!(parent, Some(ClipState::wide_open(PAGE)));
        assert_eq!(canvas.restore(), None);
    }
}
