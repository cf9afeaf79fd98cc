//! Session and viewport event taxonomy
//!
//! Subscribers register a bitmask of the events they care about; the
//! session delivers each event to subscribers whose mask contains it,
//! in subscriber creation order. `ALL_EVENTS` is the union of all defined
//! events; an empty mask suppresses delivery entirely.

use bitflags::bitflags;

bitflags! {
    /// Events observable on a session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SessionEvent: u32 {
        const CREATE = 1;
        const EDIT = 1 << 1;
        const UNDO = 1 << 2;
        const REDO = 1 << 3;
        const CLEAR = 1 << 4;
        const TRANSFORM = 1 << 5;
        const CREATE_VIEWPORT = 1 << 6;
        const SAVE = 1 << 7;
        const DESTROY = 1 << 8;
    }
}

bitflags! {
    /// Events observable on a viewport.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ViewportEvent: u32 {
        const CREATE = 1;
        const EDIT = 1 << 1;
        const UPDATED = 1 << 2;
        const TRANSFORM_START = 1 << 3;
        const TRANSFORM_END = 1 << 4;
        const DESTROY = 1 << 5;
    }
}

impl SessionEvent {
    /// Mask matching every session event.
    pub const ALL_EVENTS: SessionEvent = SessionEvent::all();
    /// Mask matching no events.
    pub const NO_EVENTS: SessionEvent = SessionEvent::empty();
}

impl ViewportEvent {
    /// Mask matching every viewport event.
    pub const ALL_EVENTS: ViewportEvent = ViewportEvent::all();
    /// Mask matching no events.
    pub const NO_EVENTS: ViewportEvent = ViewportEvent::empty();
}
