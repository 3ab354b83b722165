// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-stream operator encoding.
//!
//! Every function appends one operator (with its operands and a trailing
//! newline) to a byte buffer.

use alloc::vec::Vec;
use core::fmt::{self, Write};

use kurbo::{Affine, BezPath, PathEl, Point, Rect};
use peniko::Fill;
use vellum_imaging::PaintStyle;

use crate::resources::{ResourceIndex, ResourceKind, ResourceRef};

struct Sink<'a>(&'a mut Vec<u8>);

impl Write for Sink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// Append formatted text to `out`.
pub(crate) fn push(out: &mut Vec<u8>, args: fmt::Arguments<'_>) {
    // A Vec sink never fails.
    let _ = Sink(out).write_fmt(args);
}

/// A number in content-stream form: integral values without a fraction,
/// everything else with at most three decimals.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Num(pub(crate) f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if !v.is_finite() {
            return f.write_str("0");
        }
        if v > -1e9 && v < 1e9 {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "range checked above"
            )]
            let i = v as i64;
            #[allow(clippy::cast_precision_loss, reason = "|i| < 1e9")]
            let diff = (i as f64) - v;
            if diff > -1e-6 && diff < 1e-6 {
                return write!(f, "{i}");
            }
        }
        let mut buf = alloc::format!("{v:.3}");
        while buf.contains('.') && buf.ends_with('0') {
            buf.pop();
        }
        if buf.ends_with('.') {
            buf.pop();
        }
        if buf == "-0" {
            buf = alloc::string::String::from("0");
        }
        f.write_str(&buf)
    }
}

/// `a b c d e f cm`
pub(crate) fn append_transform(out: &mut Vec<u8>, transform: Affine) {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    push(
        out,
        format_args!(
            "{} {} {} {} {} {} cm\n",
            Num(a),
            Num(b),
            Num(c),
            Num(d),
            Num(e),
            Num(f)
        ),
    );
}

/// `x y w h re`
pub(crate) fn append_rect(out: &mut Vec<u8>, rect: Rect) {
    let rect = rect.abs();
    push(
        out,
        format_args!(
            "{} {} {} {} re\n",
            Num(rect.x0),
            Num(rect.y0),
            Num(rect.width()),
            Num(rect.height())
        ),
    );
}

/// Path construction operators. Quadratic segments are raised to cubics.
pub(crate) fn append_path(out: &mut Vec<u8>, path: &BezPath) {
    let mut current = Point::ZERO;
    let mut start = Point::ZERO;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                push(out, format_args!("{} {} m\n", Num(p.x), Num(p.y)));
                current = p;
                start = p;
            }
            PathEl::LineTo(p) => {
                push(out, format_args!("{} {} l\n", Num(p.x), Num(p.y)));
                current = p;
            }
            PathEl::QuadTo(p1, p2) => {
                let c1 = current + (p1 - current) * (2.0 / 3.0);
                let c2 = p2 + (p1 - p2) * (2.0 / 3.0);
                append_cubic(out, c1, c2, p2);
                current = p2;
            }
            PathEl::CurveTo(p1, p2, p3) => {
                append_cubic(out, p1, p2, p3);
                current = p3;
            }
            PathEl::ClosePath => {
                out.extend_from_slice(b"h\n");
                current = start;
            }
        }
    }
}

fn append_cubic(out: &mut Vec<u8>, p1: Point, p2: Point, p3: Point) {
    push(
        out,
        format_args!(
            "{} {} {} {} {} {} c\n",
            Num(p1.x),
            Num(p1.y),
            Num(p2.x),
            Num(p2.y),
            Num(p3.x),
            Num(p3.y)
        ),
    );
}

/// Path painting operator for `style`.
pub(crate) fn paint_path(out: &mut Vec<u8>, style: PaintStyle, fill_rule: Fill) {
    let op: &[u8] = match (style, fill_rule) {
        (PaintStyle::Fill, Fill::NonZero) => b"f\n",
        (PaintStyle::Fill, Fill::EvenOdd) => b"f*\n",
        (PaintStyle::Stroke, _) => b"S\n",
        (PaintStyle::FillAndStroke, Fill::NonZero) => b"B\n",
        (PaintStyle::FillAndStroke, Fill::EvenOdd) => b"B*\n",
    };
    out.extend_from_slice(op);
}

/// Intersect the clip with the current path and end it.
pub(crate) fn append_clip(out: &mut Vec<u8>, fill_rule: Fill) {
    out.extend_from_slice(match fill_rule {
        Fill::NonZero => b"W n\n",
        Fill::EvenOdd => b"W* n\n",
    });
}

/// `q`
pub(crate) fn append_save(out: &mut Vec<u8>) {
    out.extend_from_slice(b"q\n");
}

/// `Q`
pub(crate) fn append_restore(out: &mut Vec<u8>) {
    out.extend_from_slice(b"Q\n");
}

fn resource(kind: ResourceKind, index: ResourceIndex) -> ResourceRef {
    ResourceRef { kind, index }
}

/// `/Gn gs`
pub(crate) fn append_graphic_state(out: &mut Vec<u8>, index: ResourceIndex) {
    push(
        out,
        format_args!("/{} gs\n", resource(ResourceKind::GraphicState, index)),
    );
}

/// `/Xn Do`
pub(crate) fn append_xobject(out: &mut Vec<u8>, index: ResourceIndex) {
    push(
        out,
        format_args!("/{} Do\n", resource(ResourceKind::XObject, index)),
    );
}

/// `/Fn size Tf`
pub(crate) fn append_font(out: &mut Vec<u8>, index: ResourceIndex, size: f32) {
    push(
        out,
        format_args!(
            "/{} {} Tf\n",
            resource(ResourceKind::Font, index),
            Num(f64::from(size))
        ),
    );
}

/// Fill and stroke colour in `DeviceRGB`.
pub(crate) fn append_color(out: &mut Vec<u8>, rgb: [u8; 3]) {
    let [r, g, b] = rgb.map(|c| Num(f64::from(c) / 255.0));
    push(out, format_args!("{r} {g} {b} rg\n{r} {g} {b} RG\n"));
}

/// Fill and stroke with shading pattern `/Pn`.
pub(crate) fn append_pattern(out: &mut Vec<u8>, index: ResourceIndex) {
    let name = resource(ResourceKind::Shader, index);
    push(
        out,
        format_args!("/Pattern cs /{name} scn\n/Pattern CS /{name} SCN\n"),
    );
}

/// Horizontal text scaling in percent.
pub(crate) fn append_text_scale(out: &mut Vec<u8>, scale_x: f32) {
    push(out, format_args!("{} Tz\n", Num(f64::from(scale_x) * 100.0)));
}

/// Text rendering mode.
pub(crate) fn append_render_mode(out: &mut Vec<u8>, mode: u8) {
    push(out, format_args!("{mode} Tr\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    fn text(f: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut out = Vec::new();
        f(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn numbers_are_compact() {
        assert_eq!(alloc::format!("{}", Num(3.0)), "3");
        assert_eq!(alloc::format!("{}", Num(-0.5)), "-0.5");
        assert_eq!(alloc::format!("{}", Num(1.0 / 3.0)), "0.333");
        assert_eq!(alloc::format!("{}", Num(-0.0001)), "0");
        assert_eq!(alloc::format!("{}", Num(f64::NAN)), "0");
    }

    #[test]
    fn rect_and_fill() {
        let s = text(|out| {
            append_rect(out, Rect::new(10.0, 20.0, 30.0, 60.0));
            paint_path(out, PaintStyle::Fill, Fill::NonZero);
        });
        assert_eq!(s, "10 20 20 40 re\nf\n");
    }

    #[test]
    fn quad_is_raised_to_cubic() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.quad_to((3.0, 3.0), (6.0, 0.0));
        path.close_path();
        let s = text(|out| append_path(out, &path));
        assert_eq!(s, "0 0 m\n2 2 4 2 6 0 c\nh\n");
    }

    #[test]
    fn color_sets_fill_and_stroke() {
        let s = text(|out| append_color(out, [255, 0, 51]));
        assert_eq!(s, "1 0 0.2 rg\n1 0 0.2 RG\n");
    }

    #[test]
    fn resource_operators() {
        let s = text(|out| {
            append_graphic_state(out, ResourceIndex::new(2));
            append_xobject(out, ResourceIndex::new(0));
            append_font(out, ResourceIndex::new(1), 12.0);
            append_pattern(out, ResourceIndex::new(4));
        });
        assert_eq!(
            s,
            "/G2 gs\n/X0 Do\n/F1 12 Tf\n/Pattern cs /P4 scn\n/Pattern CS /P4 SCN\n"
        );
    }
}
