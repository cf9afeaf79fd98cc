//! Save flags and destination-path resolution
//!
//! The session streams segments to a temp file in the destination
//! directory and renames it into place, so a failed or cancelled save
//! leaves no partial output. This module holds the policy pieces: the
//! flag set, free-sibling-path generation for `SaveFlags::None`, and the
//! path equivalence check behind the `OriginalModified` guard.

use std::path::{Path, PathBuf};

/// How saving treats an existing destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFlags {
    /// Never clobber: an occupied path diverts to a free sibling
    /// (`file-1.dat`, `file-2.dat`, ...).
    #[default]
    None,
    /// Replace, unless the destination is the backing file and it changed
    /// externally since the session opened it.
    Overwrite,
    /// Always replace.
    ForceOverwrite,
}

/// `path` if free, else the first free sibling with `-1`, `-2`, ...
/// appended before the extension.
#[must_use]
pub fn available_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    for n in 1.. {
        let name = match &extension {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("sibling counter exhausted");
}

/// Whether two paths name the same file, resolving symlinks and relative
/// components where possible.
#[must_use]
pub fn paths_equivalent(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => a == b,
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
