//! Centralized error handling for stratum
//!
//! Every fallible operation in the crate returns [`Result`]. Caller errors
//! (bad offsets, transaction misuse) leave the session untouched; I/O and
//! cancellation errors during save or transform roll back any partial
//! output before surfacing.

use thiserror::Error;

/// Errors surfaced by sessions, searches, saves, and transforms.
#[derive(Debug, Error)]
pub enum EditError {
    /// Offset or length outside the logical file.
    #[error("range [{offset}, {offset}+{length}) is outside the logical file of {size} bytes")]
    Range { offset: u64, length: u64, size: u64 },

    /// Backing-file read or output write failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The save target changed on disk since the session opened it.
    #[error("backing file was modified outside this session")]
    OriginalModified,

    /// Transaction begun while one is open, or ended while idle.
    #[error("transaction error: {0}")]
    TransactionState(&'static str),

    /// An event callback attempted to mutate the session.
    #[error("session mutation attempted from an event callback")]
    Reentrancy,

    /// Cooperative cancellation observed between chunks.
    #[error("operation cancelled")]
    Cancelled,

    /// Search pattern exceeds the configured cap.
    #[error("search pattern of {length} bytes exceeds the cap of {max} bytes")]
    PatternTooLarge { length: usize, max: usize },

    /// Bit-shift count outside [1, 7] or fill bit outside {0, 1}.
    #[error("invalid buffer shift: {shift} bits with fill bit {fill}")]
    InvalidShift { shift: u32, fill: u8 },
}

/// Result alias for stratum operations.
pub type Result<T> = std::result::Result<T, EditError>;
