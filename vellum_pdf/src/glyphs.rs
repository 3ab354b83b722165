// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph usage per font, for subsetting.

use alloc::collections::BTreeSet;

use hashbrown::HashMap;
use vellum_imaging::{FontId, GlyphId};

/// Which glyphs of which fonts a page shows.
///
/// Sets only grow: nothing is ever removed, so the usage for a font is always
/// a superset of any earlier usage for that font.
#[derive(Clone, Debug, Default)]
pub struct GlyphUsage {
    fonts: HashMap<FontId, BTreeSet<GlyphId>>,
}

impl GlyphUsage {
    /// Creates empty usage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one glyph. Recording the same glyph again has no effect.
    pub fn record_glyph(&mut self, font: FontId, glyph: GlyphId) {
        self.fonts.entry(font).or_default().insert(glyph);
    }

    /// Record several glyphs of one font.
    pub fn record_glyphs(&mut self, font: FontId, glyphs: impl IntoIterator<Item = GlyphId>) {
        self.fonts.entry(font).or_default().extend(glyphs);
    }

    /// Glyphs used from `font`, in ascending order.
    pub fn usage_for(&self, font: FontId) -> Option<&BTreeSet<GlyphId>> {
        self.fonts.get(&font)
    }

    /// Fonts with recorded glyphs, in ascending id order.
    pub fn fonts(&self) -> impl Iterator<Item = FontId> {
        let mut ids: alloc::vec::Vec<FontId> = self.fonts.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
    }

    /// Add everything recorded in `other`.
    pub fn merge(&mut self, other: &Self) {
        for (font, glyphs) in &other.fonts {
            self.record_glyphs(*font, glyphs.iter().copied());
        }
    }

    /// Returns `true` if no glyph was recorded.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
