// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Writing entry chains as content streams.

use alloc::vec::Vec;

use crate::entry::ContentEntry;
use crate::stack::GraphicStackState;

/// Write `entries` in order, emitting only the state changes each entry
/// needs, then restore the stack.
///
/// Entries without content are skipped entirely.
pub(crate) fn write_entries(
    entries: &[ContentEntry],
    stack: &mut GraphicStackState,
    out: &mut Vec<u8>,
) {
    for entry in entries.iter().filter(|e| !e.content().is_empty()) {
        let state = entry.state();
        stack.update_clip(&state.clip, out);
        stack.update_matrix(state.transform, out);
        stack.update_drawing_state(state, out);
        out.extend_from_slice(entry.content());
    }
    stack.drain(out);
}
