// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `ExtGState` dictionaries: alpha, blend mode, stroke parameters and soft
//! masks.

use alloc::string::String;
use core::fmt::Write as _;
use core::hash::{Hash, Hasher};

use kurbo::{Cap, Join};
use peniko::Mix;
use smallvec::SmallVec;
use vellum_imaging::Paint;

use crate::ops::Num;
use crate::resources::ResourceIndex;

/// An `f32` with bitwise equality, usable as part of a hash key.
///
/// `-0.0` is stored as `0.0` and every NaN as the canonical NaN so that equal
/// values hash equally.
#[derive(Copy, Clone, Debug, Default)]
pub struct Scalar(f32);

impl Scalar {
    /// Wrap a value.
    pub fn new(value: f32) -> Self {
        if value == 0.0 {
            Self(0.0)
        } else if value.is_nan() {
            Self(f32::NAN)
        } else {
            Self(value)
        }
    }

    /// Narrow an `f64`.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "content streams carry single precision"
    )]
    pub fn from_f64(value: f64) -> Self {
        Self::new(value as f32)
    }

    /// The wrapped value.
    #[inline]
    pub fn get(self) -> f32 {
        self.0
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// PDF blend modes (the `/BM` entry).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PdfBlendMode {
    /// `/Normal`
    #[default]
    Normal,
    /// `/Multiply`
    Multiply,
    /// `/Screen`
    Screen,
    /// `/Overlay`
    Overlay,
    /// `/Darken`
    Darken,
    /// `/Lighten`
    Lighten,
    /// `/ColorDodge`
    ColorDodge,
    /// `/ColorBurn`
    ColorBurn,
    /// `/HardLight`
    HardLight,
    /// `/SoftLight`
    SoftLight,
    /// `/Difference`
    Difference,
    /// `/Exclusion`
    Exclusion,
    /// `/Hue`
    Hue,
    /// `/Saturation`
    Saturation,
    /// `/Color`
    Color,
    /// `/Luminosity`
    Luminosity,
}

impl From<Mix> for PdfBlendMode {
    fn from(mix: Mix) -> Self {
        match mix {
            Mix::Normal => Self::Normal,
            Mix::Multiply => Self::Multiply,
            Mix::Screen => Self::Screen,
            Mix::Overlay => Self::Overlay,
            Mix::Darken => Self::Darken,
            Mix::Lighten => Self::Lighten,
            Mix::ColorDodge => Self::ColorDodge,
            Mix::ColorBurn => Self::ColorBurn,
            Mix::HardLight => Self::HardLight,
            Mix::SoftLight => Self::SoftLight,
            Mix::Difference => Self::Difference,
            Mix::Exclusion => Self::Exclusion,
            Mix::Hue => Self::Hue,
            Mix::Saturation => Self::Saturation,
            Mix::Color => Self::Color,
            Mix::Luminosity => Self::Luminosity,
            _ => Self::Normal,
        }
    }
}

impl PdfBlendMode {
    /// Name used in the `/BM` entry.
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Multiply => "Multiply",
            Self::Screen => "Screen",
            Self::Overlay => "Overlay",
            Self::Darken => "Darken",
            Self::Lighten => "Lighten",
            Self::ColorDodge => "ColorDodge",
            Self::ColorBurn => "ColorBurn",
            Self::HardLight => "HardLight",
            Self::SoftLight => "SoftLight",
            Self::Difference => "Difference",
            Self::Exclusion => "Exclusion",
            Self::Hue => "Hue",
            Self::Saturation => "Saturation",
            Self::Color => "Color",
            Self::Luminosity => "Luminosity",
        }
    }
}

/// The `/SMask` entry of a graphics state.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum SoftMask {
    /// No `/SMask` entry; the current mask is left alone.
    #[default]
    Inherit,
    /// `/SMask /None`: remove any mask.
    None,
    /// Mask by the alpha of a transparency-group form.
    Alpha {
        /// XObject index of the group.
        group: ResourceIndex,
        /// Invert the mask (`1 - alpha`).
        invert: bool,
    },
}

/// Structural description of one `ExtGState` dictionary.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct GraphicStateDesc {
    /// Non-stroking alpha (`/ca`) in 1/255 steps.
    pub fill_alpha: u8,
    /// Stroking alpha (`/CA`) in 1/255 steps.
    pub stroke_alpha: u8,
    /// Blend mode.
    pub blend: PdfBlendMode,
    /// Line width (`/LW`).
    pub line_width: Scalar,
    /// Line cap (`/LC`): 0 butt, 1 round, 2 square.
    pub line_cap: u8,
    /// Line join (`/LJ`): 0 miter, 1 round, 2 bevel.
    pub line_join: u8,
    /// Miter limit (`/ML`).
    pub miter_limit: Scalar,
    /// Dash array; empty for solid lines.
    pub dash: SmallVec<[Scalar; 4]>,
    /// Dash phase.
    pub dash_phase: Scalar,
    /// Soft mask.
    pub soft_mask: SoftMask,
}

impl Default for GraphicStateDesc {
    fn default() -> Self {
        Self {
            fill_alpha: 255,
            stroke_alpha: 255,
            blend: PdfBlendMode::Normal,
            line_width: Scalar::new(1.0),
            line_cap: 0,
            line_join: 0,
            miter_limit: Scalar::new(10.0),
            dash: SmallVec::new(),
            dash_phase: Scalar::default(),
            soft_mask: SoftMask::Inherit,
        }
    }
}

impl GraphicStateDesc {
    /// Graphics state for drawing with `paint`.
    ///
    /// Fill-only paints keep the default stroke parameters so that fills with
    /// different (unused) strokes share one dictionary.
    pub fn from_paint(paint: &Paint) -> Self {
        let alpha = alpha_to_u8(paint.alpha());
        let mut desc = Self {
            fill_alpha: alpha,
            stroke_alpha: alpha,
            blend: PdfBlendMode::from(paint.blend.mix),
            ..Self::default()
        };
        if paint.style.strokes() {
            let stroke = &paint.stroke;
            desc.line_width = Scalar::from_f64(stroke.width);
            desc.line_cap = match stroke.start_cap {
                Cap::Butt => 0,
                Cap::Round => 1,
                Cap::Square => 2,
            };
            desc.line_join = match stroke.join {
                Join::Miter => 0,
                Join::Round => 1,
                Join::Bevel => 2,
            };
            desc.miter_limit = Scalar::from_f64(stroke.miter_limit);
            desc.dash = stroke.dash_pattern.iter().map(|d| Scalar::from_f64(*d)).collect();
            desc.dash_phase = Scalar::from_f64(stroke.dash_offset);
        }
        desc
    }

    /// Default state that masks by the alpha of `group`.
    pub fn soft_mask(group: ResourceIndex, invert: bool) -> Self {
        Self {
            soft_mask: SoftMask::Alpha { group, invert },
            ..Self::default()
        }
    }

    /// Default state that removes any soft mask.
    pub fn no_soft_mask() -> Self {
        Self {
            soft_mask: SoftMask::None,
            ..Self::default()
        }
    }

    /// Write the dictionary.
    ///
    /// `object_for_group` maps a soft-mask group's XObject index to the object
    /// number the document writer gave it.
    pub fn write_dict(
        &self,
        out: &mut String,
        mut object_for_group: impl FnMut(ResourceIndex) -> u32,
    ) {
        let _ = write!(
            out,
            "<< /Type /ExtGState /ca {} /CA {} /BM /{} /LW {} /LC {} /LJ {} /ML {}",
            Num(f64::from(self.fill_alpha) / 255.0),
            Num(f64::from(self.stroke_alpha) / 255.0),
            self.blend.name(),
            Num(f64::from(self.line_width.get())),
            self.line_cap,
            self.line_join,
            Num(f64::from(self.miter_limit.get())),
        );
        if !self.dash.is_empty() {
            out.push_str(" /D [[");
            for (i, d) in self.dash.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                let _ = write!(out, "{}", Num(f64::from(d.get())));
            }
            let _ = write!(out, "] {}]", Num(f64::from(self.dash_phase.get())));
        }
        match self.soft_mask {
            SoftMask::Inherit => {}
            SoftMask::None => out.push_str(" /SMask /None"),
            SoftMask::Alpha { group, invert } => {
                let _ = write!(
                    out,
                    " /SMask << /Type /Mask /S /Alpha /G {} 0 R",
                    object_for_group(group)
                );
                if invert {
                    out.push_str(" /TR << /FunctionType 2 /Domain [0 1] /C0 [1] /C1 [0] /N 1 >>");
                }
                out.push_str(" >>");
            }
        }
        out.push_str(" >>");
    }
}

/// Quantize an alpha in `0..=1` to 1/255 steps.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "clamped to 0..=255 before the cast"
)]
pub(crate) fn alpha_to_u8(alpha: f32) -> u8 {
    if alpha.is_nan() {
        return 0;
    }
    (alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Stroke;
    use peniko::Color;
    use vellum_imaging::PaintStyle;

    #[test]
    fn fills_ignore_stroke_parameters() {
        let a = Paint::default().with_stroke(Stroke::new(8.0));
        let b = Paint::default().with_stroke(Stroke::new(2.0));
        assert_eq!(GraphicStateDesc::from_paint(&a), GraphicStateDesc::from_paint(&b));
    }

    #[test]
    fn strokes_carry_parameters() {
        let paint = Paint::default()
            .with_style(PaintStyle::Stroke)
            .with_stroke(
                Stroke::new(3.0)
                    .with_join(Join::Bevel)
                    .with_caps(Cap::Round)
                    .with_dashes(1.0, [4.0, 2.0]),
            );
        let mut out = String::new();
        GraphicStateDesc::from_paint(&paint).write_dict(&mut out, |_| 0);
        assert_eq!(
            out,
            "<< /Type /ExtGState /ca 1 /CA 1 /BM /Normal /LW 3 /LC 1 /LJ 2 /ML 4 /D [[4 2] 1] >>"
        );
    }

    #[test]
    fn alpha_and_blend() {
        let paint = Paint::solid(Color::from_rgba8(0, 0, 0, 128)).with_blend(Mix::Multiply);
        let desc = GraphicStateDesc::from_paint(&paint);
        assert_eq!(desc.fill_alpha, 128);
        assert_eq!(desc.blend, PdfBlendMode::Multiply);
    }

    #[test]
    fn inverted_soft_mask_dict() {
        let mut out = String::new();
        GraphicStateDesc::soft_mask(ResourceIndex::new(2), true).write_dict(&mut out, |g| {
            assert_eq!(g, ResourceIndex::new(2), "mask names its group");
            17
        });
        assert!(out.contains("/SMask << /Type /Mask /S /Alpha /G 17 0 R /TR <<"));

        let mut out = String::new();
        GraphicStateDesc::no_soft_mask().write_dict(&mut out, |_| 0);
        assert!(out.ends_with("/SMask /None >>"));
    }

    #[test]
    fn negative_zero_is_zero() {
        assert_eq!(Scalar::new(-0.0), Scalar::new(0.0));
    }
}
