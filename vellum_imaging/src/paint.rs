// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint description: colour or shader source, blend mode, style and stroke.

use alloc::vec::Vec;

use kurbo::{Affine, Cap, Join, Point, Stroke};
use peniko::{BlendMode, Color};

use crate::FontId;

/// Which parts of a shape a paint covers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PaintStyle {
    /// Fill the interior.
    #[default]
    Fill,
    /// Stroke the outline.
    Stroke,
    /// Fill the interior, then stroke the outline.
    FillAndStroke,
}

impl PaintStyle {
    /// Returns `true` if the style strokes.
    #[inline]
    pub fn strokes(self) -> bool {
        !matches!(self, Self::Fill)
    }

    /// Returns `true` if the style fills.
    #[inline]
    pub fn fills(self) -> bool {
        !matches!(self, Self::Stroke)
    }
}

/// Colour stop of a gradient shader.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient in `0..=1`.
    pub offset: f32,
    /// Colour at `offset`.
    pub color: Color,
}

/// Gradient geometry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ShaderKind {
    /// Linear gradient between two points.
    Linear {
        /// Start point.
        start: Point,
        /// End point.
        end: Point,
    },
    /// Radial gradient around a centre.
    Radial {
        /// Centre point.
        center: Point,
        /// Outer radius.
        radius: f32,
    },
    /// Sweep (conic) gradient around a centre.
    Sweep {
        /// Centre point.
        center: Point,
        /// Start angle in degrees.
        start_angle: f32,
        /// End angle in degrees.
        end_angle: f32,
    },
}

/// How a gradient behaves outside its defined range.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Extend {
    /// Extend the end colours.
    #[default]
    Pad,
    /// Repeat the gradient.
    Repeat,
    /// Mirror the gradient on every repetition.
    Reflect,
}

/// A gradient shader in local coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Shader {
    /// Gradient geometry.
    pub kind: ShaderKind,
    /// Colour stops, sorted by offset.
    pub stops: Vec<GradientStop>,
    /// Extend mode.
    pub extend: Extend,
    /// Extra local transform of the gradient.
    pub transform: Affine,
}

impl Shader {
    /// Create a linear gradient with the given stops.
    pub fn linear(start: Point, end: Point, stops: impl Into<Vec<GradientStop>>) -> Self {
        Self {
            kind: ShaderKind::Linear { start, end },
            stops: stops.into(),
            extend: Extend::Pad,
            transform: Affine::IDENTITY,
        }
    }

    /// If every stop carries the same colour the shader paints a solid
    /// colour; returns it.
    pub fn solid_color(&self) -> Option<Color> {
        let (first, rest) = self.stops.split_first()?;
        rest.iter()
            .all(|stop| stop.color == first.color)
            .then_some(first.color)
    }

    /// Returns `true` if every stop is fully opaque.
    pub fn is_opaque(&self) -> bool {
        !self.stops.is_empty() && self.stops.iter().all(|s| s.color.components[3] >= 1.0)
    }
}

/// Where a paint takes its colour from.
#[derive(Clone, Debug, PartialEq)]
pub enum PaintSource {
    /// A single colour.
    Solid(Color),
    /// A gradient shader.
    Shader(Shader),
}

/// Text parameters used by glyph runs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// Font of the run.
    pub font: FontId,
    /// Font size in local units.
    pub size: f32,
    /// Horizontal scale factor (1.0 = no scaling).
    pub scale_x: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: FontId(0),
            size: 12.0,
            scale_x: 1.0,
        }
    }
}

/// How to paint a primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct Paint {
    /// Colour source.
    pub source: PaintSource,
    /// Blend mode (mix and compose).
    pub blend: BlendMode,
    /// Fill, stroke or both.
    pub style: PaintStyle,
    /// Stroke parameters; only consulted when `style` strokes.
    pub stroke: Stroke,
    /// Text parameters; only consulted for glyph runs.
    pub text: TextStyle,
}

impl Default for Paint {
    fn default() -> Self {
        Self::solid(Color::BLACK)
    }
}

impl Paint {
    /// An opaque-or-not solid colour fill with source-over blending.
    pub fn solid(color: Color) -> Self {
        Self {
            source: PaintSource::Solid(color),
            blend: BlendMode::default(),
            style: PaintStyle::Fill,
            stroke: Stroke::default(),
            text: TextStyle::default(),
        }
    }

    /// A shader fill with source-over blending.
    pub fn shader(shader: Shader) -> Self {
        Self {
            source: PaintSource::Shader(shader),
            ..Self::default()
        }
    }

    /// Set the blend mode.
    #[must_use]
    pub fn with_blend(mut self, blend: impl Into<BlendMode>) -> Self {
        self.blend = blend.into();
        self
    }

    /// Set the paint style.
    #[must_use]
    pub fn with_style(mut self, style: PaintStyle) -> Self {
        self.style = style;
        self
    }

    /// Set the stroke parameters.
    #[must_use]
    pub fn with_stroke(mut self, stroke: Stroke) -> Self {
        self.stroke = stroke;
        self
    }

    /// Set the text style.
    #[must_use]
    pub fn with_text(mut self, text: TextStyle) -> Self {
        self.text = text;
        self
    }

    /// Overall opacity of the paint in `0..=1`.
    ///
    /// Shaders report 1 unless they have no stops at all; per-stop alpha is
    /// carried by the shader itself.
    pub fn alpha(&self) -> f32 {
        match &self.source {
            PaintSource::Solid(color) => color.components[3],
            PaintSource::Shader(shader) if shader.stops.is_empty() => 0.0,
            PaintSource::Shader(_) => 1.0,
        }
    }

    /// Colour the paint resolves to when no pattern is needed.
    ///
    /// Shaders that are not a single colour resolve to black.
    pub fn flat_color(&self) -> Color {
        match &self.source {
            PaintSource::Solid(color) => *color,
            PaintSource::Shader(shader) => shader.solid_color().unwrap_or(Color::BLACK),
        }
    }

    /// The shader, if the paint needs a pattern to render.
    pub fn pattern(&self) -> Option<&Shader> {
        match &self.source {
            PaintSource::Shader(shader) if shader.solid_color().is_none() => Some(shader),
            _ => None,
        }
    }

    /// How far a stroke may extend beyond the geometry it outlines.
    pub fn stroke_outset(&self) -> f64 {
        if !self.style.strokes() {
            return 0.0;
        }
        let half = self.stroke.width * 0.5;
        let miter = if self.stroke.join == Join::Miter {
            self.stroke.miter_limit.max(1.0)
        } else {
            1.0
        };
        let cap = if self.stroke.start_cap == Cap::Square || self.stroke.end_cap == Cap::Square {
            core::f64::consts::SQRT_2
        } else {
            1.0
        };
        half * miter.max(cap)
    }
}
