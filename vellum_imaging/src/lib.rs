// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vellum Imaging: the draw-call vocabulary consumed by the Vellum PDF device.
//!
//! This crate defines small, plain-old-data friendly descriptions of what a
//! host canvas wants drawn. It sits between a canvas front end (which owns
//! save/restore bookkeeping, transforms and clips) and the content-stream
//! engine in `vellum_pdf`.
//!
//! # Core concepts
//!
//! - **Primitives**: [`Primitive`] is the closed set of draw-call kinds
//!   (paint, points, rect, path, bitmap, text, vertices). Geometry is given in
//!   local coordinates and is mapped to the device by the current transform.
//! - **Paints**: [`Paint`] carries the colour or [`Shader`] source, the
//!   [`BlendMode`], the [`PaintStyle`], stroke parameters and the
//!   [`TextStyle`] used for glyph runs.
//! - **Clips**: [`ClipState`] is an ordered list of device-space
//!   [`ClipElement`]s plus resolved bounds and a generation marker. Every
//!   intersection takes a process-wide unique generation, so two clip states
//!   compare equal only when one is a clone of the other (or both are wide
//!   open over the same bounds). That lets the engine detect "same clip"
//!   without comparing geometry.
//! - **Canvas state**: [`CanvasState`] is the capability-query interface the
//!   engine reads the current transform and clip through. [`CanvasStack`] is a
//!   ready-made save/restore implementation; [`DrawContext`] is a fixed one.
//!
//! # Example
//!
//! ```rust
//! use kurbo::Rect;
//! use peniko::Color;
//! use vellum_imaging::{CanvasStack, CanvasState, Paint, Primitive};
//!
//! let mut canvas = CanvasStack::new(Rect::new(0.0, 0.0, 612.0, 792.0));
//! canvas.save();
//! canvas.clip_rect(Rect::new(10.0, 10.0, 100.0, 100.0));
//! assert_eq!(canvas.clip().bounds(), Rect::new(10.0, 10.0, 100.0, 100.0));
//!
//! let paint = Paint::solid(Color::from_rgba8(255, 0, 0, 255));
//! let rect = Primitive::Rect(Rect::new(20.0, 20.0, 40.0, 40.0));
//! assert!(rect.local_bounds(&paint).is_some());
//!
//! let parent = canvas.restore();
//! assert!(parent.is_some_and(|clip| clip.is_wide_open()));
//! ```

#![no_std]

extern crate alloc;

mod canvas;
mod clip;
mod paint;

use alloc::vec::Vec;
use kurbo::{BezPath, PathEl, Point, Rect, Shape};

pub use canvas::{CanvasStack, CanvasState, DrawContext};
pub use clip::{ClipElement, ClipShape, ClipState};
pub use paint::{
    Extend, GradientStop, Paint, PaintSource, PaintStyle, Shader, ShaderKind, TextStyle,
};
pub use peniko::{BlendMode, Color, Compose, Fill as FillRule, Mix};

/// Affine transform type used by the imaging vocabulary.
pub type Affine = kurbo::Affine;

/// Stroke parameters (width, joins, caps, dashes).
pub type StrokeStyle = kurbo::Stroke;

/// Glyph identifier inside a font.
pub type GlyphId = u16;

/// Identifier for a font (typeface) known to the host's font subsystem.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub u32);

/// Identifier for an image known to the host.
///
/// The device never looks at pixels; it only places the image and hands the
/// id to the document writer.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u32);

/// How a [`Primitive::Points`] list is interpreted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointMode {
    /// Every point is drawn on its own.
    Points,
    /// Consecutive pairs of points form independent line segments.
    Lines,
    /// All points form one open polyline.
    Polygon,
}

/// How a [`Primitive::Vertices`] list is assembled into triangles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VertexMode {
    /// Every three vertices form a triangle.
    Triangles,
    /// Each vertex after the second forms a triangle with the previous two.
    TriangleStrip,
    /// Each vertex after the second forms a triangle with the previous one
    /// and the first vertex.
    TriangleFan,
}

/// A glyph positioned in local coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PositionedGlyph {
    /// Glyph id in the font of the run's [`TextStyle`].
    pub id: GlyphId,
    /// X position of the glyph origin.
    pub x: f64,
    /// Y position of the glyph origin (baseline).
    pub y: f64,
}

/// A run of already-shaped glyphs.
///
/// Shaping and font fallback happen upstream; the run only carries resolved
/// glyph ids and their origins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphRun {
    /// Positioned glyphs in drawing order.
    pub glyphs: Vec<PositionedGlyph>,
}

impl GlyphRun {
    /// Create a run from glyph ids laid out at fixed positions.
    pub fn from_glyphs(glyphs: impl IntoIterator<Item = (GlyphId, Point)>) -> Self {
        Self {
            glyphs: glyphs
                .into_iter()
                .map(|(id, p)| PositionedGlyph { id, x: p.x, y: p.y })
                .collect(),
        }
    }
}

/// One draw call.
///
/// This is a closed set: a device handles each kind explicitly rather than
/// through an open trait hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Fill the entire drawing area with the paint.
    Paint,
    /// Draw a list of points as dots, segments or a polyline.
    Points {
        /// Interpretation of `points`.
        mode: PointMode,
        /// Points in local coordinates.
        points: Vec<Point>,
    },
    /// Draw an axis-aligned rectangle in local coordinates.
    Rect(Rect),
    /// Draw a path in local coordinates.
    Path {
        /// Path geometry.
        path: BezPath,
        /// Fill rule used when the paint fills.
        fill_rule: FillRule,
    },
    /// Place an image. The image occupies `0..width × 0..height` in the
    /// coordinate system given by `transform` (applied after the current
    /// transform).
    Bitmap {
        /// Image to place.
        image: ImageId,
        /// Width in image pixels.
        width: u32,
        /// Height in image pixels.
        height: u32,
        /// Extra transform for the image.
        transform: Affine,
    },
    /// Draw a glyph run with the paint's text style.
    Text(GlyphRun),
    /// Draw a triangle mesh with a flat paint.
    Vertices {
        /// Triangle assembly mode.
        mode: VertexMode,
        /// Vertices in local coordinates.
        vertices: Vec<Point>,
    },
}

impl Primitive {
    /// Returns `true` for glyph runs.
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns `true` if the primitive cannot produce any marks regardless of
    /// paint or clip.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Self::Paint | Self::Rect(_) => false,
            Self::Points { mode, points } => match mode {
                PointMode::Points => points.is_empty(),
                PointMode::Lines | PointMode::Polygon => points.len() < 2,
            },
            Self::Path { path, .. } => !path.elements().iter().any(draws_segment),
            Self::Bitmap { width, height, .. } => *width == 0 || *height == 0,
            Self::Text(run) => run.glyphs.is_empty(),
            Self::Vertices { vertices, .. } => vertices.len() < 3,
        }
    }

    /// Conservative bounds of the marks this primitive makes, in local
    /// coordinates.
    ///
    /// Returns `None` for [`Primitive::Paint`], which is unbounded.
    pub fn local_bounds(&self, paint: &Paint) -> Option<Rect> {
        let stroke_pad = paint.stroke_outset();
        match self {
            Self::Paint => None,
            Self::Points { points, .. } => {
                // Points are always stroked.
                let pad = paint.stroke.width * 0.5;
                points_bounds(points).map(|r| r.inflate(pad, pad))
            }
            Self::Rect(rect) => Some(rect.abs().inflate(stroke_pad, stroke_pad)),
            Self::Path { path, .. } => Some(path.bounding_box().inflate(stroke_pad, stroke_pad)),
            Self::Bitmap {
                width,
                height,
                transform,
                ..
            } => Some(transform.transform_rect_bbox(Rect::new(
                0.0,
                0.0,
                f64::from(*width),
                f64::from(*height),
            ))),
            Self::Text(run) => {
                // Glyph outlines are unknown here; use an em box around each origin.
                let size = f64::from(paint.text.size) * f64::from(paint.text.scale_x.max(1.0));
                let origins: Vec<Point> = run.glyphs.iter().map(|g| Point::new(g.x, g.y)).collect();
                points_bounds(&origins).map(|r| r.inflate(size + stroke_pad, size + stroke_pad))
            }
            Self::Vertices { vertices, .. } => points_bounds(vertices),
        }
    }
}

fn draws_segment(el: &PathEl) -> bool {
    matches!(el, PathEl::LineTo(_) | PathEl::QuadTo(..) | PathEl::CurveTo(..))
}

fn points_bounds(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    let mut rect = Rect::from_points(*first, *first);
    for p in rest {
        rect = rect.union_pt(*p);
    }
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn degenerate_primitives() {
        assert!(!Primitive::Paint.is_degenerate());
        assert!(
            Primitive::Points {
                mode: PointMode::Points,
                points: Vec::new(),
            }
            .is_degenerate()
        );
        assert!(Primitive::Text(GlyphRun::default()).is_degenerate());
        assert!(
            !Primitive::Points {
                mode: PointMode::Points,
                points: vec![Point::ZERO],
            }
            .is_degenerate()
        );
        assert!(
            Primitive::Vertices {
                mode: VertexMode::Triangles,
                vertices: vec![Point::ZERO, Point::new(1.0, 0.0)],
            }
            .is_degenerate()
        );
    }

    #[test]
    fn segments_need_two_points() {
        for mode in [PointMode::Lines, PointMode::Polygon] {
            let one = Primitive::Points {
                mode,
                points: vec![Point::ZERO],
            };
            assert!(one.is_degenerate(), "{mode:?} with one point");
            let two = Primitive::Points {
                mode,
                points: vec![Point::ZERO, Point::new(1.0, 1.0)],
            };
            assert!(!two.is_degenerate(), "{mode:?} with two points");
        }
    }

    #[test]
    fn path_needs_a_drawing_segment() {
        let mut moves = BezPath::new();
        moves.move_to((1.0, 1.0));
        moves.move_to((2.0, 2.0));
        moves.close_path();
        let path = |path| Primitive::Path {
            path,
            fill_rule: FillRule::NonZero,
        };
        assert!(path(BezPath::new()).is_degenerate());
        assert!(path(moves.clone()).is_degenerate());

        moves.line_to((3.0, 3.0));
        assert!(!path(moves).is_degenerate());
    }

    #[test]
    fn stroke_inflates_rect_bounds() {
        let rect = Primitive::Rect(Rect::new(10.0, 10.0, 20.0, 20.0));
        let fill = Paint::default();
        assert_eq!(
            rect.local_bounds(&fill),
            Some(Rect::new(10.0, 10.0, 20.0, 20.0))
        );

        let stroke = Paint::default()
            .with_style(PaintStyle::Stroke)
            .with_stroke(StrokeStyle::new(4.0).with_join(kurbo::Join::Bevel));
        assert_eq!(
            rect.local_bounds(&stroke),
            Some(Rect::new(8.0, 8.0, 22.0, 22.0))
        );
    }

    #[test]
    fn paint_is_unbounded() {
        assert_eq!(Primitive::Paint.local_bounds(&Paint::default()), None);
    }

    #[test]
    fn bitmap_bounds_follow_transform() {
        let bitmap = Primitive::Bitmap {
            image: ImageId(0),
            width: 4,
            height: 2,
            transform: Affine::translate((10.0, 5.0)),
        };
        assert_eq!(
            bitmap.local_bounds(&Paint::default()),
            Some(Rect::new(10.0, 5.0, 14.0, 7.0))
        );
    }
}
