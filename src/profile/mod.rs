//! Byte-frequency and character-width profiling
//!
//! Both profilers are single linear scans over the logical byte stream,
//! fed chunk by chunk so arbitrarily large ranges never materialize in
//! memory. Character counting classifies each codepoint's encoded length
//! into 1/2/3/4-byte buckets; bytes that are not part of a valid codepoint
//! land in `invalid_bytes`, so the weighted bucket sum always equals the
//! scanned range length.

use std::fmt;

/// Text encoding identified by a leading byte-order mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ByteOrderMark {
    #[default]
    None,
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl ByteOrderMark {
    /// Classify up to four leading bytes. The four-byte UTF-32 marks are
    /// checked before their two-byte UTF-16 prefixes.
    #[must_use]
    pub fn detect(prefix: &[u8]) -> Self {
        if prefix.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
            ByteOrderMark::Utf32Le
        } else if prefix.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
            ByteOrderMark::Utf32Be
        } else if prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
            ByteOrderMark::Utf8
        } else if prefix.starts_with(&[0xFF, 0xFE]) {
            ByteOrderMark::Utf16Le
        } else if prefix.starts_with(&[0xFE, 0xFF]) {
            ByteOrderMark::Utf16Be
        } else {
            ByteOrderMark::None
        }
    }

    /// Length of the mark itself in bytes.
    #[must_use]
    pub fn bom_len(&self) -> usize {
        match self {
            ByteOrderMark::None => 0,
            ByteOrderMark::Utf16Le | ByteOrderMark::Utf16Be => 2,
            ByteOrderMark::Utf8 => 3,
            ByteOrderMark::Utf32Le | ByteOrderMark::Utf32Be => 4,
        }
    }
}

impl fmt::Display for ByteOrderMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ByteOrderMark::None => "none",
            ByteOrderMark::Utf8 => "UTF-8",
            ByteOrderMark::Utf16Le => "UTF-16LE",
            ByteOrderMark::Utf16Be => "UTF-16BE",
            ByteOrderMark::Utf32Le => "UTF-32LE",
            ByteOrderMark::Utf32Be => "UTF-32BE",
        };
        f.write_str(name)
    }
}

/// Per-byte-value occurrence counts over a logical range.
pub type ByteFrequencyProfile = [u64; 256];

pub(crate) fn accumulate_frequency(profile: &mut ByteFrequencyProfile, chunk: &[u8]) {
    for &b in chunk {
        profile[b as usize] += 1;
    }
}

/// Character-width histogram over a logical range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CharacterCounts {
    pub bom: ByteOrderMark,
    pub single_byte: u64,
    pub double_byte: u64,
    pub triple_byte: u64,
    pub quad_byte: u64,
    pub invalid_bytes: u64,
}

impl CharacterCounts {
    /// `1·single + 2·double + 3·triple + 4·quad + invalid`; always equals
    /// the scanned range length.
    #[must_use]
    pub fn weighted_sum(&self) -> u64 {
        self.single_byte
            + 2 * self.double_byte
            + 3 * self.triple_byte
            + 4 * self.quad_byte
            + self.invalid_bytes
    }
}

/// Incremental character counter fed by consecutive chunks of the range.
#[derive(Debug)]
pub struct CharacterCounter {
    counts: CharacterCounts,
    /// Trailing bytes of the previous chunk that did not complete a
    /// codepoint; at most 3 live here.
    pending: [u8; 8],
    pending_len: usize,
}

impl CharacterCounter {
    #[must_use]
    pub fn new(bom: ByteOrderMark) -> Self {
        CharacterCounter {
            counts: CharacterCounts {
                bom,
                ..CharacterCounts::default()
            },
            pending: [0; 8],
            pending_len: 0,
        }
    }

    /// Feed the next chunk of the range.
    pub fn push(&mut self, mut chunk: &[u8]) {
        if self.pending_len > 0 {
            // Top up the carry buffer so the split codepoint can complete,
            // then hand the rest of the chunk to the bulk path.
            let old = self.pending_len;
            let take = chunk.len().min(self.pending.len() - old);
            self.pending[old..old + take].copy_from_slice(&chunk[..take]);
            self.pending_len = old + take;

            let carry = self.pending;
            let consumed = self.scan(&carry[..self.pending_len]);
            if consumed < old {
                // The chunk was too small to complete the carried bytes;
                // it has been absorbed into the carry entirely.
                debug_assert_eq!(take, chunk.len());
                let leftover = self.pending_len - consumed;
                self.pending.copy_within(consumed..consumed + leftover, 0);
                self.pending_len = leftover;
                return;
            }
            // Carry bytes copied from the chunk but not consumed are
            // still present in `chunk` and get rescanned there.
            chunk = &chunk[consumed - old..];
            self.pending_len = 0;
        }
        if !chunk.is_empty() {
            self.push_fresh(chunk);
        }
    }

    fn push_fresh(&mut self, chunk: &[u8]) {
        let consumed = self.scan(chunk);
        let leftover = chunk.len() - consumed;
        debug_assert!(leftover <= 4);
        self.pending[..leftover].copy_from_slice(&chunk[consumed..]);
        self.pending_len = leftover;
    }

    /// Close the range: any codepoint truncated at the range end counts
    /// its bytes as invalid.
    #[must_use]
    pub fn finish(mut self) -> CharacterCounts {
        self.counts.invalid_bytes += self.pending_len as u64;
        self.counts
    }

    /// Count complete codepoints in `data`, returning the bytes consumed.
    /// A trailing incomplete sequence is left unconsumed.
    fn scan(&mut self, data: &[u8]) -> usize {
        match self.counts.bom {
            ByteOrderMark::None | ByteOrderMark::Utf8 => self.scan_utf8(data),
            ByteOrderMark::Utf16Le | ByteOrderMark::Utf16Be => {
                let units = data.len() / 2;
                self.counts.double_byte += units as u64;
                units * 2
            }
            ByteOrderMark::Utf32Le | ByteOrderMark::Utf32Be => {
                let units = data.len() / 4;
                self.counts.quad_byte += units as u64;
                units * 4
            }
        }
    }

    fn scan_utf8(&mut self, data: &[u8]) -> usize {
        let mut i = 0;
        while i < data.len() {
            let lead = data[i];
            let need = match lead {
                0x00..=0x7F => 1,
                0xC2..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF4 => 4,
                // Continuation byte out of place, overlong lead, or > U+10FFFF.
                _ => {
                    self.counts.invalid_bytes += 1;
                    i += 1;
                    continue;
                }
            };
            if i + need > data.len() {
                // Possibly completed by the next chunk.
                break;
            }
            if need == 1 {
                self.counts.single_byte += 1;
                i += 1;
                continue;
            }
            if valid_sequence(&data[i..i + need]) {
                match need {
                    2 => self.counts.double_byte += 1,
                    3 => self.counts.triple_byte += 1,
                    _ => self.counts.quad_byte += 1,
                }
                i += need;
            } else {
                self.counts.invalid_bytes += 1;
                i += 1;
            }
        }
        i
    }
}

/// Validate the continuation bytes of a multi-byte UTF-8 sequence,
/// including the lead-specific second-byte ranges that reject overlong
/// encodings, surrogates, and codepoints past U+10FFFF.
fn valid_sequence(seq: &[u8]) -> bool {
    let second_range = match seq[0] {
        0xE0 => 0xA0..=0xBF,
        0xED => 0x80..=0x9F,
        0xF0 => 0x90..=0xBF,
        0xF4 => 0x80..=0x8F,
        _ => 0x80..=0xBF,
    };
    if !second_range.contains(&seq[1]) {
        return false;
    }
    seq[2..].iter().all(|b| (0x80..=0xBF).contains(b))
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
