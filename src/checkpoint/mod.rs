//! Checkpoint spill files
//!
//! A checkpoint captures a stable snapshot of a logical range in a spill
//! file so transforms have a linear base to read from. Spill files live in
//! the session's checkpoint directory under a session-unique prefix; they
//! are not a stable on-disk format and are deleted when their checkpoint
//! is destroyed or the session drops.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::change::Serial;
use crate::constants::CHECKPOINT_PREFIX;
use crate::error::Result;

/// A spilled snapshot of a logical range.
#[derive(Debug)]
pub struct Checkpoint {
    spill: NamedTempFile,
    start: u64,
    end: u64,
    serial: Serial,
}

impl Checkpoint {
    pub(crate) fn new(spill: NamedTempFile, start: u64, end: u64, serial: Serial) -> Self {
        Checkpoint {
            spill,
            start,
            end,
            serial,
        }
    }

    /// Path of the spill file; valid only while the checkpoint lives.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.spill.path()
    }

    /// Logical bounds captured, `[start, end)`.
    #[must_use]
    pub fn bounds(&self) -> (u64, u64) {
        (self.start, self.end)
    }

    /// Serial of the last change applied when the checkpoint was taken.
    #[must_use]
    pub fn serial(&self) -> Serial {
        self.serial
    }
}

/// Creates spill files in the configured checkpoint directory.
#[derive(Debug)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        CheckpointManager { dir }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Create an empty spill file, deleted automatically when dropped.
    pub fn create_spill(&self) -> Result<NamedTempFile> {
        let spill = tempfile::Builder::new()
            .prefix(CHECKPOINT_PREFIX)
            .tempfile_in(&self.dir)?;
        log::debug!("checkpoint spill created at {}", spill.path().display());
        Ok(spill)
    }
}
