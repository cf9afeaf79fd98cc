//! Random-access reader over the backing file
//!
//! The backing file is opened read-only and never mutated by the session;
//! reads are position-independent so concurrent readers never contend on a
//! shared cursor. Size and modification time are captured at open so the
//! saver can detect external modification before overwriting in place.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;

/// Byte source backing a session model: either absent (an empty session)
/// or a read-only file.
#[derive(Debug)]
pub enum ByteSource {
    Empty,
    File(FileSource),
}

/// A read-only file with its metadata captured at open time.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl ByteSource {
    /// A source with no bytes, for sessions created without a backing file.
    #[must_use]
    pub fn empty() -> Self {
        ByteSource::Empty
    }

    /// Open `path` read-only, capturing its current size and mtime.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        Ok(ByteSource::File(FileSource {
            file,
            path: path.to_path_buf(),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }))
    }

    /// Size of the source in bytes, as captured at open.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            ByteSource::Empty => 0,
            ByteSource::File(src) => src.len,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ByteSource::Empty => None,
            ByteSource::File(src) => Some(&src.path),
        }
    }

    /// Fill `buf` with bytes starting at `offset`.
    ///
    /// The requested range must lie within the source; short files surface
    /// as `Io` errors rather than short reads.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        match self {
            ByteSource::Empty => {
                if buf.is_empty() {
                    Ok(())
                } else {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "read from empty byte source",
                    )
                    .into())
                }
            }
            ByteSource::File(src) => src.read_at(offset, buf),
        }
    }

    /// Whether the file on disk no longer matches the size/mtime captured
    /// at open. Always false for empty sources.
    #[must_use]
    pub fn externally_modified(&self) -> bool {
        match self {
            ByteSource::Empty => false,
            ByteSource::File(src) => src.externally_modified(),
        }
    }

    /// Re-capture size/mtime from disk after the session itself replaced
    /// the file (reads keep coming from the original inode).
    pub(crate) fn recapture_metadata(&mut self) {
        if let ByteSource::File(src) = self {
            if let Ok(metadata) = std::fs::metadata(&src.path) {
                src.len = metadata.len();
                src.modified = metadata.modified().ok();
            }
        }
    }
}

impl FileSource {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        use std::os::windows::fs::FileExt;
        let mut pos = 0usize;
        while pos < buf.len() {
            let n = self.file.seek_read(&mut buf[pos..], offset + pos as u64)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "short read from backing file",
                )
                .into());
            }
            pos += n;
        }
        Ok(())
    }

    fn externally_modified(&self) -> bool {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => {
                metadata.len() != self.len || metadata.modified().ok() != self.modified
            }
            // Deleted or unreadable counts as modified.
            Err(_) => true,
        }
    }
}
