// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Font resources and the injected font resolver.

use alloc::vec::Vec;

use vellum_imaging::{FontId, GlyphId};

use crate::ops::push;

/// How the font subsystem encodes a range of glyphs of one typeface.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FontDescriptor {
    /// Two-byte (CID) encoding; otherwise one byte per glyph relative to
    /// `first_glyph`.
    pub multi_byte: bool,
    /// First glyph covered by the font resource.
    pub first_glyph: GlyphId,
    /// Last glyph covered by the font resource.
    pub last_glyph: GlyphId,
}

/// Font subsystem as seen by the device.
///
/// One typeface may need several PDF font resources (single-byte fonts cover
/// at most 256 glyphs); the resolver says which range a glyph falls in.
pub trait FontResolver {
    /// The font resource range covering `glyph`, or `None` if the glyph cannot
    /// be shown.
    fn resolve(&self, font: FontId, glyph: GlyphId) -> Option<FontDescriptor>;
}

/// Treats every typeface as one multi-byte font covering all glyph ids.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultFontResolver;

impl FontResolver for DefaultFontResolver {
    fn resolve(&self, _font: FontId, _glyph: GlyphId) -> Option<FontDescriptor> {
        Some(FontDescriptor {
            multi_byte: true,
            first_glyph: 0,
            last_glyph: GlyphId::MAX,
        })
    }
}

/// A font resource: one glyph range of one typeface.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FontResource {
    /// Typeface.
    pub font: FontId,
    /// Glyph range and encoding.
    pub descriptor: FontDescriptor,
}

impl FontResource {
    /// Returns `true` if `glyph` can be shown with this resource.
    pub fn covers(&self, glyph: GlyphId) -> bool {
        (self.descriptor.first_glyph..=self.descriptor.last_glyph).contains(&glyph)
    }

    /// Append `glyph` as a hex string operand.
    ///
    /// The glyph must be covered by this resource.
    pub fn encode_glyph(&self, glyph: GlyphId, out: &mut Vec<u8>) {
        debug_assert!(self.covers(glyph), "glyph outside font resource range");
        if self.descriptor.multi_byte {
            push(out, format_args!("<{glyph:04X}>"));
        } else {
            let code = glyph.wrapping_sub(self.descriptor.first_glyph) & 0xFF;
            push(out, format_args!("<{code:02X}>"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_byte_encoding() {
        let font = FontResource {
            font: FontId(1),
            descriptor: DefaultFontResolver.resolve(FontId(1), 0x41).unwrap(),
        };
        let mut out = Vec::new();
        font.encode_glyph(0x1A2, &mut out);
        assert_eq!(out, b"<01A2>");
    }

    #[test]
    fn single_byte_encoding_is_relative() {
        let font = FontResource {
            font: FontId(1),
            descriptor: FontDescriptor {
                multi_byte: false,
                first_glyph: 256,
                last_glyph: 511,
            },
        };
        assert!(font.covers(300));
        assert!(!font.covers(255));
        let mut out = Vec::new();
        font.encode_glyph(300, &mut out);
        assert_eq!(out, b"<2C>");
    }
}
