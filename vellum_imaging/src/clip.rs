// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device-space clip state.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use kurbo::{BezPath, Rect, Shape};
use peniko::Fill;

/// Geometry of one clip element.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipShape {
    /// Axis-aligned rectangle.
    Rect(Rect),
    /// Arbitrary path with a fill rule.
    Path {
        /// Path geometry.
        path: BezPath,
        /// Fill rule deciding the inside of the path.
        fill_rule: Fill,
    },
}

impl ClipShape {
    /// Bounding box of the shape.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Rect(rect) => rect.abs(),
            Self::Path { path, .. } => path.bounding_box(),
        }
    }
}

/// One intersected clip, already mapped to device space.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipElement {
    /// Device-space geometry.
    pub shape: ClipShape,
}

impl ClipElement {
    /// A rectangular clip element.
    pub fn rect(rect: Rect) -> Self {
        Self {
            shape: ClipShape::Rect(rect),
        }
    }

    /// A path clip element.
    pub fn path(path: BezPath, fill_rule: Fill) -> Self {
        Self {
            shape: ClipShape::Path { path, fill_rule },
        }
    }
}

/// Source of clip generations, shared by every producer in the process.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// The clip in effect for a draw call.
///
/// A clip is the intersection of its elements, bounded by `bounds`. The
/// `generation` marker identifies the clip: every [`intersect`](Self::intersect)
/// takes a generation no other clip in the process has, so two states with
/// the same generation are clones of one clip. Generation 0 is reserved for
/// wide-open clips, which are told apart by their bounds.
#[derive(Clone, Debug)]
pub struct ClipState {
    elements: Arc<[ClipElement]>,
    bounds: Rect,
    generation: u64,
}

impl PartialEq for ClipState {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && self.bounds == other.bounds
    }
}

impl Eq for ClipState {}

impl ClipState {
    /// A clip with no elements covering `bounds`.
    pub fn wide_open(bounds: Rect) -> Self {
        Self {
            elements: Arc::from(Vec::new()),
            bounds: bounds.abs(),
            generation: 0,
        }
    }

    /// Intersect with `element`, producing a clip with a fresh generation.
    #[must_use]
    pub fn intersect(&self, element: ClipElement) -> Self {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let bounds = self.bounds.intersect(element.shape.bounds());
        let mut elements: Vec<ClipElement> = self.elements.iter().cloned().collect();
        elements.push(element);
        Self {
            elements: elements.into(),
            bounds,
            generation,
        }
    }

    /// Elements in intersection order.
    #[inline]
    pub fn elements(&self) -> &[ClipElement] {
        &self.elements
    }

    /// Device-space bounds of the clip.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Generation marker.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if nothing can be drawn through this clip.
    pub fn is_empty(&self) -> bool {
        self.bounds.width() <= 0.0 || self.bounds.height() <= 0.0
    }

    /// Returns `true` if the clip has no elements.
    #[inline]
    pub fn is_wide_open(&self) -> bool {
        self.elements.is_empty()
    }

    /// If the clip is exactly a rectangle, return it.
    pub fn as_exact_rect(&self) -> Option<Rect> {
        self.elements
            .iter()
            .all(|e| matches!(e.shape, ClipShape::Rect(_)))
            .then_some(self.bounds)
    }

    /// Returns `true` if the clip is a rectangle containing all of `area`.
    pub fn covers(&self, area: Rect) -> bool {
        self.as_exact_rect().is_some_and(|rect| {
            rect.x0 <= area.x0 && rect.y0 <= area.y0 && rect.x1 >= area.x1 && rect.y1 >= area.y1
        })
    }
}
