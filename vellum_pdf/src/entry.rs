// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content entries and the per-area entry chain.

use alloc::vec::Vec;

use kurbo::Rect;
use log::trace;

use crate::graphic_state::Scalar;
use crate::resources::ResourceIndex;
use crate::snapshot::{EntryDecision, GraphicsStateSnapshot, compare};

/// Device-space extent of what an entry has drawn.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum EntryBounds {
    /// Nothing with known extent was appended.
    #[default]
    Empty,
    /// Everything appended lies inside this rectangle.
    Bounded(Rect),
    /// Extent unknown.
    Unbounded,
}

impl EntryBounds {
    /// Grow to include `bounds` (`None` meaning unknown extent).
    pub fn include(&mut self, bounds: Option<Rect>) {
        *self = match (*self, bounds) {
            (_, None) | (Self::Unbounded, _) => Self::Unbounded,
            (Self::Empty, Some(r)) => Self::Bounded(r),
            (Self::Bounded(a), Some(b)) => Self::Bounded(a.union(b)),
        };
    }

    /// Returns `true` if everything drawn lies within `rect`.
    pub fn lies_within(&self, rect: Rect) -> bool {
        match self {
            Self::Empty => true,
            Self::Bounded(b) => {
                b.x0 >= rect.x0 && b.y0 >= rect.y0 && b.x1 <= rect.x1 && b.y1 <= rect.y1
            }
            Self::Unbounded => false,
        }
    }

    /// Returns `true` if nothing drawn touches the interior of `rect`.
    pub fn lies_outside(&self, rect: Rect) -> bool {
        match self {
            Self::Empty => true,
            Self::Bounded(b) => {
                b.x1 <= rect.x0 || b.x0 >= rect.x1 || b.y1 <= rect.y0 || b.y0 >= rect.y1
            }
            Self::Unbounded => false,
        }
    }
}

/// One snapshot plus the operators drawn under it.
#[derive(Clone, Debug)]
pub struct ContentEntry {
    state: GraphicsStateSnapshot,
    content: Vec<u8>,
    bounds: EntryBounds,
    font: Option<(ResourceIndex, Scalar)>,
}

impl ContentEntry {
    fn new(state: GraphicsStateSnapshot) -> Self {
        Self {
            state,
            content: Vec::new(),
            bounds: EntryBounds::Empty,
            font: None,
        }
    }

    /// Snapshot every operator in this entry is drawn under.
    #[inline]
    pub fn state(&self) -> &GraphicsStateSnapshot {
        &self.state
    }

    /// Operator bytes.
    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Extent of the drawn content.
    #[inline]
    pub fn bounds(&self) -> EntryBounds {
        self.bounds
    }

    /// Font and size selected by the last `Tf` in this entry.
    #[inline]
    pub fn font(&self) -> Option<(ResourceIndex, Scalar)> {
        self.font
    }
}

/// Where a new entry goes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Placement {
    /// After everything drawn so far.
    Append,
    /// Before everything drawn so far.
    Prepend,
}

/// Identifies the open entry of a chain.
///
/// A handle goes stale whenever entries move (prepend, clear, prune).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EntryHandle {
    index: usize,
    epoch: u64,
}

/// Insertion-ordered entries of one drawing area.
///
/// At most one entry is open for appends at a time. Entries before it are
/// never modified again, short of being removed wholesale.
#[derive(Clone, Debug, Default)]
pub struct ContentChain {
    entries: Vec<ContentEntry>,
    open: Option<usize>,
    sealed: bool,
    epoch: u64,
}

impl ContentChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in chain order.
    #[inline]
    pub fn entries(&self) -> &[ContentEntry] {
        &self.entries
    }

    /// Returns `true` if no entry holds any bytes.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.content.is_empty())
    }

    /// Return an entry for `snapshot`, reusing the tail when it matches.
    ///
    /// On a new entry the previous tail is closed for good. An empty tail is
    /// reused in place with the new snapshot. [`Placement::Prepend`] always
    /// opens a fresh entry at the head.
    pub fn begin_or_reuse_entry(
        &mut self,
        snapshot: GraphicsStateSnapshot,
        placement: Placement,
    ) -> EntryHandle {
        if placement == Placement::Prepend {
            self.entries.insert(0, ContentEntry::new(snapshot));
            self.epoch += 1;
            self.open = Some(0);
            trace!("prepended content entry");
            return self.handle(0);
        }

        let tail = self.entries.len().checked_sub(1);
        let tail_state = tail
            .filter(|_| !self.sealed)
            .map(|i| &self.entries[i].state);
        if compare(&snapshot, tail_state) == EntryDecision::Reuse {
            let index = tail.expect("reuse decision without a tail");
            trace!("reusing content entry {index}");
            self.open = Some(index);
            return self.handle(index);
        }

        let index = match tail {
            Some(i) if self.entries[i].content.is_empty() => {
                self.entries[i] = ContentEntry::new(snapshot);
                i
            }
            _ => {
                self.entries.push(ContentEntry::new(snapshot));
                self.entries.len() - 1
            }
        };
        trace!("opened content entry {index}");
        self.sealed = false;
        self.open = Some(index);
        self.handle(index)
    }

    fn handle(&self, index: usize) -> EntryHandle {
        EntryHandle {
            index,
            epoch: self.epoch,
        }
    }

    fn open_entry(&mut self, handle: EntryHandle) -> &mut ContentEntry {
        assert!(
            handle.epoch == self.epoch && self.open == Some(handle.index),
            "append to a closed content entry"
        );
        &mut self.entries[handle.index]
    }

    /// Append operators of unknown extent.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is not the open entry.
    pub fn append(&mut self, handle: EntryHandle, bytes: &[u8]) {
        let entry = self.open_entry(handle);
        entry.content.extend_from_slice(bytes);
        entry.bounds.include(None);
    }

    /// Append operators that lie within `bounds` (device space).
    ///
    /// # Panics
    ///
    /// Panics if `handle` is not the open entry.
    pub fn append_bounded(&mut self, handle: EntryHandle, bytes: &[u8], bounds: Rect) {
        let entry = self.open_entry(handle);
        entry.content.extend_from_slice(bytes);
        entry.bounds.include(Some(bounds));
    }

    /// Font selected in the open entry.
    pub fn font(&mut self, handle: EntryHandle) -> Option<(ResourceIndex, Scalar)> {
        self.open_entry(handle).font
    }

    /// Record the font selected in the open entry.
    pub fn set_font(&mut self, handle: EntryHandle, font: (ResourceIndex, Scalar)) {
        self.open_entry(handle).font = Some(font);
    }

    /// Close the open entry; the tail stays reusable.
    pub fn close(&mut self) {
        self.open = None;
    }

    /// Close the open entry and forbid reusing the tail.
    pub fn seal(&mut self) {
        self.open = None;
        self.sealed = true;
    }

    /// Remove entries for which `prune` returns `true`, then seal.
    pub fn prune(&mut self, mut prune: impl FnMut(&ContentEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !prune(e));
        self.epoch += 1;
        self.seal();
        before - self.entries.len()
    }

    /// Take every entry out of the chain.
    pub fn take(&mut self) -> Vec<ContentEntry> {
        self.epoch += 1;
        self.open = None;
        self.sealed = false;
        core::mem::take(&mut self.entries)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Affine;
    use vellum_imaging::ClipState;

    fn snapshot(color: u8) -> GraphicsStateSnapshot {
        GraphicsStateSnapshot {
            transform: Affine::IDENTITY,
            clip: ClipState::wide_open(Rect::new(0.0, 0.0, 100.0, 100.0)),
            color: [color, 0, 0],
            shader: None,
            graphic_state: ResourceIndex::new(0),
            text: None,
        }
    }

    #[test]
    fn matching_draws_coalesce() {
        let mut chain = ContentChain::new();
        for _ in 0..3 {
            let h = chain.begin_or_reuse_entry(snapshot(1), Placement::Append);
            chain.append(h, b"x\n");
            chain.close();
        }
        assert_eq!(chain.entries().len(), 1);
        assert_eq!(chain.entries()[0].content(), b"x\nx\nx\n");
    }

    #[test]
    fn empty_tail_is_reused_in_place() {
        let mut chain = ContentChain::new();
        chain.begin_or_reuse_entry(snapshot(1), Placement::Append);
        chain.close();
        let h = chain.begin_or_reuse_entry(snapshot(2), Placement::Append);
        chain.append(h, b"y\n");
        assert_eq!(chain.entries().len(), 1);
        assert_eq!(chain.entries()[0].state().color[0], 2);
    }

    #[test]
    fn seal_forces_new_entry() {
        let mut chain = ContentChain::new();
        let h = chain.begin_or_reuse_entry(snapshot(1), Placement::Append);
        chain.append(h, b"a\n");
        chain.seal();
        let h = chain.begin_or_reuse_entry(snapshot(1), Placement::Append);
        chain.append(h, b"b\n");
        assert_eq!(chain.entries().len(), 2);
    }

    #[test]
    fn prepend_goes_to_head_and_tail_stays_reusable() {
        let mut chain = ContentChain::new();
        let h = chain.begin_or_reuse_entry(snapshot(1), Placement::Append);
        chain.append(h, b"a\n");
        chain.close();
        let h = chain.begin_or_reuse_entry(snapshot(1), Placement::Prepend);
        chain.append(h, b"p\n");
        chain.close();
        let h = chain.begin_or_reuse_entry(snapshot(1), Placement::Append);
        chain.append(h, b"b\n");
        let contents: Vec<&[u8]> = chain.entries().iter().map(ContentEntry::content).collect();
        assert_eq!(contents, [&b"p\n"[..], &b"a\nb\n"[..]]);
    }

    #[test]
    #[should_panic(expected = "append to a closed content entry")]
    fn append_to_closed_entry_panics() {
        let mut chain = ContentChain::new();
        let first = chain.begin_or_reuse_entry(snapshot(1), Placement::Append);
        chain.append(first, b"a\n");
        chain.begin_or_reuse_entry(snapshot(2), Placement::Append);
        chain.append(first, b"b\n");
    }

    #[test]
    fn prune_removes_matching_entries() {
        let mut chain = ContentChain::new();
        for (color, x) in [(1, 0.0), (2, 50.0)] {
            let h = chain.begin_or_reuse_entry(snapshot(color), Placement::Append);
            chain.append_bounded(h, b"r\n", Rect::new(x, 0.0, x + 10.0, 10.0));
        }
        let removed = chain.prune(|e| e.bounds().lies_within(Rect::new(40.0, 0.0, 70.0, 20.0)));
        assert_eq!(removed, 1);
        assert_eq!(chain.entries()[0].state().color[0], 1);
    }

    #[test]
    fn bounds_accumulate() {
        let mut bounds = EntryBounds::Empty;
        bounds.include(Some(Rect::new(0.0, 0.0, 1.0, 1.0)));
        bounds.include(Some(Rect::new(5.0, 5.0, 6.0, 6.0)));
        assert_eq!(bounds, EntryBounds::Bounded(Rect::new(0.0, 0.0, 6.0, 6.0)));
        assert!(bounds.lies_outside(Rect::new(10.0, 10.0, 20.0, 20.0)));
        bounds.include(None);
        assert!(!bounds.lies_within(Rect::new(-100.0, -100.0, 100.0, 100.0)));
    }
}
