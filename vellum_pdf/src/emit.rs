// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry emitters: primitives to path construction and painting operators.

use alloc::vec::Vec;

use kurbo::{BezPath, Point, Rect};
use peniko::Fill;
use vellum_imaging::{PaintStyle, PointMode, VertexMode};

use crate::ops::{self, Num, push};

/// Encodes resolved geometry into operator bytes.
///
/// Geometry arrives in local coordinates; the device takes care of the
/// transform, clip and paint state.
pub trait OperatorEmitter {
    /// Points, segments or a polyline, always stroked.
    fn points(&self, mode: PointMode, points: &[Point], out: &mut Vec<u8>);

    /// A rectangle.
    fn rect(&self, rect: Rect, style: PaintStyle, out: &mut Vec<u8>);

    /// A path.
    fn path(&self, path: &BezPath, fill_rule: Fill, style: PaintStyle, out: &mut Vec<u8>);

    /// A triangle mesh, filled flat.
    fn vertices(&self, mode: VertexMode, vertices: &[Point], out: &mut Vec<u8>);
}

/// Emits plain PDF path operators.
#[derive(Copy, Clone, Debug, Default)]
pub struct PdfOperatorEmitter;

fn move_to(out: &mut Vec<u8>, p: Point) {
    push(out, format_args!("{} {} m\n", Num(p.x), Num(p.y)));
}

fn line_to(out: &mut Vec<u8>, p: Point) {
    push(out, format_args!("{} {} l\n", Num(p.x), Num(p.y)));
}

fn triangle(out: &mut Vec<u8>, a: Point, b: Point, c: Point) {
    move_to(out, a);
    line_to(out, b);
    line_to(out, c);
    out.extend_from_slice(b"h\n");
}

impl OperatorEmitter for PdfOperatorEmitter {
    fn points(&self, mode: PointMode, points: &[Point], out: &mut Vec<u8>) {
        match mode {
            PointMode::Points => {
                // A zero-length segment shows as a dot with round or square caps.
                for p in points {
                    move_to(out, *p);
                    line_to(out, *p);
                }
            }
            PointMode::Lines => {
                for pair in points.chunks_exact(2) {
                    move_to(out, pair[0]);
                    line_to(out, pair[1]);
                }
            }
            PointMode::Polygon => {
                if let Some((first, rest)) = points.split_first() {
                    move_to(out, *first);
                    for p in rest {
                        line_to(out, *p);
                    }
                }
            }
        }
        ops::paint_path(out, PaintStyle::Stroke, Fill::NonZero);
    }

    fn rect(&self, rect: Rect, style: PaintStyle, out: &mut Vec<u8>) {
        ops::append_rect(out, rect);
        ops::paint_path(out, style, Fill::NonZero);
    }

    fn path(&self, path: &BezPath, fill_rule: Fill, style: PaintStyle, out: &mut Vec<u8>) {
        ops::append_path(out, path);
        ops::paint_path(out, style, fill_rule);
    }

    fn vertices(&self, mode: VertexMode, vertices: &[Point], out: &mut Vec<u8>) {
        match mode {
            VertexMode::Triangles => {
                for t in vertices.chunks_exact(3) {
                    triangle(out, t[0], t[1], t[2]);
                }
            }
            VertexMode::TriangleStrip => {
                for t in vertices.windows(3) {
                    triangle(out, t[0], t[1], t[2]);
                }
            }
            VertexMode::TriangleFan => {
                if let Some((center, rest)) = vertices.split_first() {
                    for pair in rest.windows(2) {
                        triangle(out, *center, pair[0], pair[1]);
                    }
                }
            }
        }
        ops::paint_path(out, PaintStyle::Fill, Fill::NonZero);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    fn emit(f: impl FnOnce(&PdfOperatorEmitter, &mut Vec<u8>)) -> String {
        let mut out = Vec::new();
        f(&PdfOperatorEmitter, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn lines_pair_up_points() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        ];
        let s = emit(|e, out| e.points(PointMode::Lines, &pts, out));
        assert_eq!(s, "0 0 m\n1 1 l\nS\n");
    }

    #[test]
    fn fan_shares_first_vertex() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let s = emit(|e, out| e.vertices(VertexMode::TriangleFan, &pts, out));
        assert_eq!(
            s,
            "0 0 m\n1 0 l\n1 1 l\nh\n0 0 m\n1 1 l\n0 1 l\nh\nf\n"
        );
    }

    #[test]
    fn stroked_rect() {
        let s = emit(|e, out| e.rect(Rect::new(1.0, 2.0, 4.0, 6.0), PaintStyle::Stroke, out));
        assert_eq!(s, "1 2 3 4 re\nS\n");
    }
}
