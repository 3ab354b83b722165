// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shading patterns.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use kurbo::Affine;
use vellum_imaging::{Shader, ShaderKind};

use crate::graphic_state::Scalar;
use crate::ops::Num;

/// Gradient geometry of a shading.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShadingGeometry {
    /// Axial shading between two points.
    Axial([Scalar; 4]),
    /// Radial shading from a centre point to a circle.
    Radial([Scalar; 3]),
}

/// Structural key of a shading pattern.
///
/// The matrix maps pattern space to the page's default space, so two draws of
/// the same gradient under different transforms are different patterns.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ShaderDesc {
    /// Gradient geometry in shader space.
    pub geometry: ShadingGeometry,
    /// Stops as offset and 8-bit RGB.
    pub stops: Vec<(Scalar, [u8; 3])>,
    /// Pattern matrix.
    pub matrix: [Scalar; 6],
}

impl ShaderDesc {
    /// Key for `shader` drawn under `transform` (shader space to page
    /// space). Sweep gradients have no PDF shading type and yield `None`.
    pub fn new(shader: &Shader, transform: Affine) -> Option<Self> {
        let geometry = match shader.kind {
            ShaderKind::Linear { start, end } => ShadingGeometry::Axial([
                Scalar::from_f64(start.x),
                Scalar::from_f64(start.y),
                Scalar::from_f64(end.x),
                Scalar::from_f64(end.y),
            ]),
            ShaderKind::Radial { center, radius } => ShadingGeometry::Radial([
                Scalar::from_f64(center.x),
                Scalar::from_f64(center.y),
                Scalar::new(radius),
            ]),
            ShaderKind::Sweep { .. } => return None,
        };
        let stops = shader
            .stops
            .iter()
            .map(|stop| {
                let rgba = stop.color.to_rgba8();
                (Scalar::new(stop.offset), [rgba.r, rgba.g, rgba.b])
            })
            .collect();
        Some(Self {
            geometry,
            stops,
            matrix: (transform * shader.transform)
                .as_coeffs()
                .map(Scalar::from_f64),
        })
    }

    /// Write the pattern dictionary with its shading inline.
    pub fn write_pattern_dict(&self, out: &mut String) {
        out.push_str("<< /PatternType 2 /Matrix [");
        write_scalars(out, &self.matrix);
        out.push_str("] /Shading << ");
        match &self.geometry {
            ShadingGeometry::Axial(coords) => {
                out.push_str("/ShadingType 2 /Coords [");
                write_scalars(out, coords);
            }
            ShadingGeometry::Radial([x, y, r]) => {
                out.push_str("/ShadingType 3 /Coords [");
                write_scalars(out, &[*x, *y, Scalar::new(0.0), *x, *y, *r]);
            }
        }
        out.push_str("] /ColorSpace /DeviceRGB /Function ");
        self.write_function(out);
        // Repeat and reflect have no shading form; every shading pads.
        out.push_str(" /Extend [true true] >> >>");
    }

    fn write_function(&self, out: &mut String) {
        match self.stops.as_slice() {
            [] => out.push_str("<< /FunctionType 2 /Domain [0 1] /C0 [0 0 0] /C1 [0 0 0] /N 1 >>"),
            [only] => write_interpolation(out, only.1, only.1),
            [first, second] => write_interpolation(out, first.1, second.1),
            stops => {
                // Stitch one interpolation per pair of neighbouring stops.
                out.push_str("<< /FunctionType 3 /Domain [0 1] /Functions [");
                for pair in stops.windows(2) {
                    out.push(' ');
                    write_interpolation(out, pair[0].1, pair[1].1);
                }
                out.push_str(" ] /Bounds [");
                let inner = &stops[1..stops.len() - 1];
                write_scalars(out, &inner.iter().map(|s| s.0).collect::<Vec<_>>());
                out.push_str("] /Encode [");
                for (i, _) in stops.windows(2).enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str("0 1");
                }
                out.push_str("] >>");
            }
        }
    }
}

fn write_interpolation(out: &mut String, c0: [u8; 3], c1: [u8; 3]) {
    let rgb = |c: [u8; 3]| c.map(|v| Num(f64::from(v) / 255.0));
    let [r0, g0, b0] = rgb(c0);
    let [r1, g1, b1] = rgb(c1);
    let _ = write!(
        out,
        "<< /FunctionType 2 /Domain [0 1] /C0 [{r0} {g0} {b0}] /C1 [{r1} {g1} {b1}] /N 1 >>"
    );
}

fn write_scalars(out: &mut String, values: &[Scalar]) {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}", Num(f64::from(v.get())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use peniko::Color;
    use vellum_imaging::GradientStop;

    fn gradient(colors: &[Color]) -> Shader {
        #[allow(clippy::cast_precision_loss, reason = "tiny test inputs")]
        let last = (colors.len().max(2) - 1) as f32;
        let stops: Vec<GradientStop> = colors
            .iter()
            .enumerate()
            .map(|(i, color)| {
                #[allow(clippy::cast_precision_loss, reason = "tiny test inputs")]
                let offset = i as f32 / last;
                GradientStop {
                    offset,
                    color: *color,
                }
            })
            .collect();
        Shader::linear(Point::ZERO, Point::new(100.0, 0.0), stops)
    }

    #[test]
    fn same_gradient_same_transform_is_equal() {
        let g = gradient(&[Color::BLACK, Color::WHITE]);
        let a = ShaderDesc::new(&g, Affine::IDENTITY);
        let b = ShaderDesc::new(&g, Affine::IDENTITY);
        assert_eq!(a, b);
        assert_ne!(a, ShaderDesc::new(&g, Affine::scale(2.0)));
    }

    #[test]
    fn sweep_is_unsupported() {
        let mut g = gradient(&[Color::BLACK, Color::WHITE]);
        g.kind = ShaderKind::Sweep {
            center: Point::ZERO,
            start_angle: 0.0,
            end_angle: 360.0,
        };
        assert_eq!(ShaderDesc::new(&g, Affine::IDENTITY), None);
    }

    #[test]
    fn axial_pattern_dict() {
        let desc = ShaderDesc::new(&gradient(&[Color::BLACK, Color::WHITE]), Affine::IDENTITY)
            .unwrap();
        let mut out = String::new();
        desc.write_pattern_dict(&mut out);
        assert_eq!(
            out,
            "<< /PatternType 2 /Matrix [1 0 0 1 0 0] /Shading << /ShadingType 2 \
             /Coords [0 0 100 0] /ColorSpace /DeviceRGB /Function \
             << /FunctionType 2 /Domain [0 1] /C0 [0 0 0] /C1 [1 1 1] /N 1 >> \
             /Extend [true true] >> >>"
        );
    }

    #[test]
    fn three_stops_are_stitched() {
        let red = Color::from_rgba8(255, 0, 0, 255);
        let desc = ShaderDesc::new(
            &gradient(&[Color::BLACK, red, Color::WHITE]),
            Affine::IDENTITY,
        )
        .unwrap();
        let mut out = String::new();
        desc.write_pattern_dict(&mut out);
        assert!(out.contains("/FunctionType 3"));
        assert!(out.contains("/Bounds [0.5] /Encode [0 1 0 1]"));
    }
}
