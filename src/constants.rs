//! Global constants for stratum

/// Maximum capacity of a single viewport, in bytes.
pub const VIEWPORT_CAPACITY_MAX: usize = 1 << 20;

/// Longest accepted search pattern, half the viewport capacity cap.
pub const SEARCH_PATTERN_MAX: usize = VIEWPORT_CAPACITY_MAX / 2;

/// Window size for session byte transforms.
pub const TRANSFORM_WINDOW: usize = 8 * 1024;

/// Chunk size for streaming reads during save and file transforms.
pub const IO_CHUNK: usize = 8 * 1024;

/// Haystack window size for segment-walking searches.
pub const SEARCH_CHUNK: usize = 8 * 1024;

/// File name prefix for checkpoint spill files.
pub const CHECKPOINT_PREFIX: &str = "stratum-ckpt-";
