//! Viewport management
//!
//! A viewport is a window into a range of the logical file with a cached
//! byte buffer and event subscriptions. The owning session reloads the
//! cache and fires the viewport callback whenever a mutation overlaps the
//! window.
//!
//! ## Invariants
//!
//! - A live viewport's cache always equals the logical file restricted to
//!   `[offset, offset + capacity)`.
//! - Viewports never mutate session contents.
//! - Floating viewports track their content: edits strictly before the
//!   window shift the offset rather than the bytes under it.

use std::sync::Arc;

use crate::change::Change;
use crate::event::ViewportEvent;

/// Handle identifying a viewport within its session.
pub type ViewportId = u64;

/// Callback fired on viewport events. The change is `None` for synthetic
/// resets (creation, checkpoint pops) where no single change applies.
pub type ViewportCallback = Box<dyn FnMut(&Viewport, ViewportEvent, Option<&Arc<Change>>)>;

/// A live window into the logical file.
pub struct Viewport {
    id: ViewportId,
    offset: u64,
    capacity: usize,
    floating: bool,
    data: Vec<u8>,
    event_mask: ViewportEvent,
    pub(crate) callback: Option<ViewportCallback>,
}

impl Viewport {
    pub(crate) fn new(
        id: ViewportId,
        offset: u64,
        capacity: usize,
        floating: bool,
        callback: Option<ViewportCallback>,
        event_mask: ViewportEvent,
    ) -> Self {
        Viewport {
            id,
            offset,
            capacity,
            floating,
            data: Vec::with_capacity(capacity),
            event_mask,
            callback,
        }
    }

    #[must_use]
    pub fn id(&self) -> ViewportId {
        self.id
    }

    /// Logical offset of the window start.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Maximum window length in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether edits before the window shift its offset.
    #[must_use]
    pub fn is_floating(&self) -> bool {
        self.floating
    }

    /// Cached window bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Current window length (≤ capacity; shorter near end of file).
    #[must_use]
    pub fn length(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn event_mask(&self) -> ViewportEvent {
        self.event_mask
    }

    /// Bytes of the logical file beyond this window.
    #[must_use]
    pub fn following_byte_count(&self, logical_size: u64) -> u64 {
        logical_size.saturating_sub(self.offset + self.data.len() as u64)
    }

    /// Whether a mutation over `[offset, offset + len)` overlaps the
    /// window. Zero-length mutations at the window boundary still count:
    /// an insert at the window start shifts its contents.
    #[must_use]
    pub fn intersects(&self, offset: u64, len: u64) -> bool {
        let window_end = self.offset + self.capacity as u64;
        offset < window_end && offset + len >= self.offset
    }

    pub(crate) fn set_window(&mut self, offset: u64, capacity: usize, floating: bool) {
        self.offset = offset;
        self.capacity = capacity;
        self.floating = floating;
    }

    pub(crate) fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Offset adjustment for an insert of `len` bytes at `offset`.
    /// Only floating viewports move, and only for inserts at or before the
    /// window start.
    pub(crate) fn shift_for_insert(&mut self, offset: u64, len: u64) {
        if self.floating && offset <= self.offset {
            self.offset += len;
        }
    }

    /// Offset adjustment for a delete of `len` bytes at `offset`. Deletes
    /// entirely before the window shift it left; a delete straddling the
    /// window start clips the offset back to the delete point.
    pub(crate) fn shift_for_delete(&mut self, offset: u64, len: u64) {
        if !self.floating {
            return;
        }
        if offset + len <= self.offset {
            self.offset -= len;
        } else if offset < self.offset {
            self.offset = offset;
        }
    }
}
