// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compose-mode routing.
//!
//! PDF paints source-over only (with a separable or non-separable `/BM`).
//! Porter-Duff modes that read or replace the destination are rerouted.

use peniko::Compose;

/// How a draw reaches the content stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Route {
    /// Append to the active area.
    Direct,
    /// Append source-over; the compose mode has no PDF equivalent.
    Fallback(Compose),
    /// Draw in isolation and composite with the destination through soft
    /// masks.
    Isolate(Compose),
    /// Erase the clip area from existing content first; draw the source
    /// afterwards if `draw_source`.
    Erase {
        /// Whether the source is drawn after erasing.
        draw_source: bool,
    },
    /// Open a new entry before everything drawn so far.
    Prepend,
    /// The result is the destination unchanged.
    Discard,
}

impl Route {
    /// Nested forms the route interns when the destination is (non-)empty.
    pub(crate) fn forms_needed(self, destination_empty: bool) -> usize {
        match self {
            Self::Isolate(_) if destination_empty => 1,
            Self::Isolate(_) => 3,
            Self::Erase { .. } => 2,
            _ => 0,
        }
    }
}

/// Pick the route for `compose`.
pub(crate) fn route(compose: Compose, destination_empty: bool) -> Route {
    match compose {
        Compose::SrcOver => Route::Direct,
        Compose::DestOver => Route::Prepend,
        Compose::Dest => Route::Discard,
        Compose::Clear => Route::Erase { draw_source: false },
        Compose::Copy => Route::Erase { draw_source: true },
        // Over nothing, only `SrcOut` leaves anything behind.
        Compose::SrcIn | Compose::DestIn | Compose::DestOut if destination_empty => Route::Discard,
        Compose::SrcIn | Compose::DestIn | Compose::SrcOut | Compose::DestOut => {
            Route::Isolate(compose)
        }
        other => Route::Fallback(other),
    }
}
