//! Pattern search over the segmented logical file
//!
//! Boyer-Moore-Horspool in both directions, with a 256-entry skip table
//! built once per context. The haystack is the logical file, so the
//! engine reads fixed windows through the session and overlaps them by
//! `m - 1` bytes so matches spanning segment boundaries are found.
//! Single-byte needles degenerate to memchr/memrchr. Case-insensitive
//! search folds the needle and each window to ASCII lowercase; only ASCII
//! folding is defined.

use std::ops::Range;

use crate::constants::{SEARCH_CHUNK, SEARCH_PATTERN_MAX};
use crate::error::{EditError, Result};
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SearchDirection {
    #[default]
    Forward,
    Reverse,
}

/// An in-progress search over a session range. Read-only with respect to
/// the session; create after the edits you want visible.
pub struct SearchContext<'a> {
    session: &'a Session,
    needle: Vec<u8>,
    case_insensitive: bool,
    direction: SearchDirection,
    range: Range<u64>,
    skip: Box<[usize; 256]>,
    /// Forward: lowest offset the next match may start at.
    /// Reverse: exclusive end the next match must fit below.
    cursor: u64,
    matched: Option<(u64, u64)>,
    exhausted: bool,
}

impl<'a> SearchContext<'a> {
    pub(crate) fn new(
        session: &'a Session,
        pattern: &[u8],
        case_insensitive: bool,
        offset: u64,
        length: u64,
        direction: SearchDirection,
    ) -> Result<Self> {
        if pattern.len() > SEARCH_PATTERN_MAX {
            return Err(EditError::PatternTooLarge {
                length: pattern.len(),
                max: SEARCH_PATTERN_MAX,
            });
        }
        let size = session.size();
        if offset > size {
            return Err(EditError::Range {
                offset,
                length,
                size,
            });
        }
        let end = if length == 0 {
            size
        } else {
            (offset + length).min(size)
        };

        let mut needle = pattern.to_vec();
        if case_insensitive {
            needle.make_ascii_lowercase();
        }
        let skip = build_skip_table(&needle, direction);
        let cursor = match direction {
            SearchDirection::Forward => offset,
            SearchDirection::Reverse => end,
        };
        Ok(SearchContext {
            session,
            exhausted: needle.is_empty(),
            needle,
            case_insensitive,
            direction,
            range: offset..end,
            skip,
            cursor,
            matched: None,
        })
    }

    /// Length of the (possibly folded) needle.
    #[must_use]
    pub fn pattern_length(&self) -> usize {
        self.needle.len()
    }

    /// Offset of the most recent match.
    #[must_use]
    pub fn match_offset(&self) -> Option<u64> {
        self.matched.map(|(off, _)| off)
    }

    /// Length of the most recent match.
    #[must_use]
    pub fn match_length(&self) -> Option<u64> {
        self.matched.map(|(_, len)| len)
    }

    /// Find the next match, or `None` when the range is exhausted.
    ///
    /// With `advance_past_match` the next search resumes beyond the whole
    /// match; otherwise it resumes one byte past the match start so
    /// overlapping matches are reported.
    pub fn next_match(&mut self, advance_past_match: bool) -> Result<Option<(u64, u64)>> {
        if self.exhausted {
            return Ok(None);
        }
        let result = match self.direction {
            SearchDirection::Forward => self.next_forward(advance_past_match)?,
            SearchDirection::Reverse => self.next_reverse(advance_past_match)?,
        };
        match result {
            Some(hit) => self.matched = Some(hit),
            None => self.exhausted = true,
        }
        Ok(result)
    }

    fn next_forward(&mut self, advance: bool) -> Result<Option<(u64, u64)>> {
        let m = self.needle.len() as u64;
        loop {
            if self.cursor + m > self.range.end {
                return Ok(None);
            }
            if self.session.is_cancel_requested() {
                return Err(EditError::Cancelled);
            }
            let window_len = (SEARCH_CHUNK as u64 + m - 1).min(self.range.end - self.cursor);
            if window_len < m {
                return Ok(None);
            }
            let mut window = self.session.read(self.cursor, window_len)?;
            if self.case_insensitive {
                window.make_ascii_lowercase();
            }
            if let Some(i) = find_forward(&window, &self.needle, &self.skip) {
                let offset = self.cursor + i as u64;
                self.cursor = if advance { offset + m } else { offset + 1 };
                return Ok(Some((offset, m)));
            }
            // Overlap the next window so boundary matches are not missed.
            self.cursor += window_len - (m - 1);
        }
    }

    fn next_reverse(&mut self, advance: bool) -> Result<Option<(u64, u64)>> {
        let m = self.needle.len() as u64;
        loop {
            if self.cursor < self.range.start + m {
                return Ok(None);
            }
            if self.session.is_cancel_requested() {
                return Err(EditError::Cancelled);
            }
            let window_start = self
                .cursor
                .saturating_sub(SEARCH_CHUNK as u64 + m - 1)
                .max(self.range.start);
            let mut window = self.session.read(window_start, self.cursor - window_start)?;
            if self.case_insensitive {
                window.make_ascii_lowercase();
            }
            if let Some(i) = find_reverse(&window, &self.needle, &self.skip) {
                let offset = window_start + i as u64;
                self.cursor = if advance { offset } else { offset + m - 1 };
                return Ok(Some((offset, m)));
            }
            if window_start == self.range.start {
                return Ok(None);
            }
            self.cursor = window_start + m - 1;
        }
    }
}

/// Skip table per the BMH construction: for a forward search
/// `skip[c] = (m-1) - max{i < m-1 : needle[i] = c}`, defaulting to `m-1`;
/// the reverse table is the mirror image.
fn build_skip_table(needle: &[u8], direction: SearchDirection) -> Box<[usize; 256]> {
    let m = needle.len();
    let default = m.saturating_sub(1).max(1);
    let mut skip = Box::new([default; 256]);
    if m > 1 {
        match direction {
            SearchDirection::Forward => {
                for (i, &b) in needle[..m - 1].iter().enumerate() {
                    skip[b as usize] = m - 1 - i;
                }
            }
            SearchDirection::Reverse => {
                for (i, &b) in needle.iter().enumerate().skip(1).rev() {
                    skip[b as usize] = i;
                }
            }
        }
    }
    skip
}

/// Leftmost occurrence of `needle` in `haystack`.
fn find_forward(haystack: &[u8], needle: &[u8], skip: &[usize; 256]) -> Option<usize> {
    let m = needle.len();
    if m > haystack.len() {
        return None;
    }
    if m == 1 {
        return memchr::memchr(needle[0], haystack);
    }
    let last_needle = needle[m - 1];
    let mut pos = 0;
    while pos <= haystack.len() - m {
        let probe = haystack[pos + m - 1];
        if probe == last_needle && &haystack[pos..pos + m] == needle {
            return Some(pos);
        }
        pos += skip[probe as usize];
    }
    None
}

/// Rightmost occurrence of `needle` in `haystack`.
fn find_reverse(haystack: &[u8], needle: &[u8], skip: &[usize; 256]) -> Option<usize> {
    let m = needle.len();
    if m > haystack.len() {
        return None;
    }
    if m == 1 {
        return memchr::memrchr(needle[0], haystack);
    }
    let first_needle = needle[0];
    let mut pos = (haystack.len() - m) as isize;
    while pos >= 0 {
        let probe = haystack[pos as usize];
        if probe == first_needle && &haystack[pos as usize..pos as usize + m] == needle {
            return Some(pos as usize);
        }
        pos -= skip[probe as usize] as isize;
    }
    None
}
