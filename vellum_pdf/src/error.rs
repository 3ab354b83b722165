// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors, quality-loss warnings and draw outcomes.

use peniko::Compose;
use thiserror::Error;
use vellum_imaging::{FontId, GlyphId};

use crate::resources::ResourceKind;

/// Recoverable failures of the content engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ContentError {
    /// A resource table reached its configured capacity.
    #[error("{kind} table is full ({limit} entries)")]
    ResourceExhausted {
        /// Table that is full.
        kind: ResourceKind,
        /// Its configured capacity.
        limit: usize,
    },
    /// The device configuration is unusable.
    #[error("invalid device configuration: {0}")]
    InvalidConfig(&'static str),
}

/// A draw that was recorded with reduced fidelity.
///
/// Warnings accumulate on the device and are handed back by
/// [`PdfDevice::finish`](crate::PdfDevice::finish).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum QualityLoss {
    /// The compose mode has no PDF equivalent and was drawn source-over.
    #[error("compose mode {0:?} has no PDF equivalent, drawn source-over")]
    UnsupportedCompose(Compose),
    /// No room for the nested forms an isolated composite needs; drawn
    /// source-over.
    #[error("no room for isolation forms, {0:?} drawn source-over")]
    IsolationDegraded(Compose),
    /// No room for the nested forms an erase needs; existing content under
    /// the clip was kept.
    #[error("no room for erase forms, {0:?} did not erase existing content")]
    EraseSkipped(Compose),
    /// The font subsystem could not place a glyph in any font resource.
    #[error("glyph {glyph} of font {font:?} could not be resolved")]
    UnresolvedGlyph {
        /// Font of the glyph.
        font: FontId,
        /// Glyph id.
        glyph: GlyphId,
    },
    /// The shader kind cannot be expressed as a PDF shading; its first stop
    /// colour was used.
    #[error("sweep gradients are not supported, painted with a flat colour")]
    UnsupportedShader,
    /// A resource could not be interned and the draw that needed it was
    /// dropped.
    #[error("{0} table is full, draw dropped")]
    ResourceDropped(ResourceKind),
}

/// Why a draw call recorded nothing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The clip is empty or misses the primitive entirely.
    ClippedOut,
    /// Source-over with a fully transparent paint.
    Transparent,
    /// The primitive has no geometry.
    EmptyGeometry,
    /// A full-area paint under a non-invertible transform.
    SingularTransform,
    /// The compose mode leaves the destination untouched.
    NothingToDraw,
    /// The compose mode needs existing content and there is none.
    EmptyDestination,
    /// No glyph of a text run could be resolved.
    UnresolvedGlyphs,
    /// A resource the draw needs could not be interned.
    ResourceExhausted,
}

/// Result of a draw call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Operators were recorded, or existing content was changed.
    Recorded,
    /// Nothing was recorded.
    Skipped(SkipReason),
}

impl DrawOutcome {
    /// Returns `true` if the draw changed the page.
    #[inline]
    pub fn is_recorded(self) -> bool {
        matches!(self, Self::Recorded)
    }
}
