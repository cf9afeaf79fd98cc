//! Tests for BOM detection and character counting

use crate::profile::{
    accumulate_frequency, ByteOrderMark, CharacterCounter, CharacterCounts,
};

fn count(bytes: &[u8], bom: ByteOrderMark) -> CharacterCounts {
    let mut counter = CharacterCounter::new(bom);
    counter.push(bytes);
    counter.finish()
}

/// Same input split into tiny chunks must produce identical counts.
fn count_chunked(bytes: &[u8], bom: ByteOrderMark, chunk: usize) -> CharacterCounts {
    let mut counter = CharacterCounter::new(bom);
    for piece in bytes.chunks(chunk) {
        counter.push(piece);
    }
    counter.finish()
}

#[test]
fn test_detect_bom() {
    assert_eq!(ByteOrderMark::detect(b"\xEF\xBB\xBFhello"), ByteOrderMark::Utf8);
    assert_eq!(ByteOrderMark::detect(b"\xFF\xFEab"), ByteOrderMark::Utf16Le);
    assert_eq!(ByteOrderMark::detect(b"\xFE\xFFab"), ByteOrderMark::Utf16Be);
    assert_eq!(
        ByteOrderMark::detect(b"\xFF\xFE\x00\x00"),
        ByteOrderMark::Utf32Le
    );
    assert_eq!(
        ByteOrderMark::detect(b"\x00\x00\xFE\xFF"),
        ByteOrderMark::Utf32Be
    );
    assert_eq!(ByteOrderMark::detect(b"plain"), ByteOrderMark::None);
    assert_eq!(ByteOrderMark::detect(b""), ByteOrderMark::None);
}

#[test]
fn test_utf32le_wins_over_utf16le_prefix() {
    // FF FE 00 00 is both a UTF-16LE BOM followed by NUL and a UTF-32LE
    // BOM; the longer mark takes precedence.
    assert_eq!(
        ByteOrderMark::detect(&[0xFF, 0xFE, 0x00, 0x00, 0x41]),
        ByteOrderMark::Utf32Le
    );
    assert_eq!(
        ByteOrderMark::detect(&[0xFF, 0xFE, 0x41, 0x00]),
        ByteOrderMark::Utf16Le
    );
}

#[test]
fn test_bom_len() {
    assert_eq!(ByteOrderMark::None.bom_len(), 0);
    assert_eq!(ByteOrderMark::Utf8.bom_len(), 3);
    assert_eq!(ByteOrderMark::Utf16Be.bom_len(), 2);
    assert_eq!(ByteOrderMark::Utf32Be.bom_len(), 4);
}

#[test]
fn test_ascii_counts() {
    let counts = count(b"hello world", ByteOrderMark::Utf8);
    assert_eq!(counts.single_byte, 11);
    assert_eq!(counts.invalid_bytes, 0);
    assert_eq!(counts.weighted_sum(), 11);
}

#[test]
fn test_mixed_width_utf8() {
    // "aé€😀" = 1 + 2 + 3 + 4 bytes
    let text = "aé€😀".as_bytes();
    let counts = count(text, ByteOrderMark::Utf8);
    assert_eq!(counts.single_byte, 1);
    assert_eq!(counts.double_byte, 1);
    assert_eq!(counts.triple_byte, 1);
    assert_eq!(counts.quad_byte, 1);
    assert_eq!(counts.invalid_bytes, 0);
    assert_eq!(counts.weighted_sum(), text.len() as u64);
}

#[test]
fn test_invalid_utf8_bytes() {
    // Lone continuation, overlong lead, and a truncated triple.
    let counts = count(&[0x80, 0xC0, 0x41, 0xE2, 0x82], ByteOrderMark::Utf8);
    assert_eq!(counts.single_byte, 1);
    assert_eq!(counts.invalid_bytes, 4);
    assert_eq!(counts.weighted_sum(), 5);
}

#[test]
fn test_surrogate_rejected_in_utf8() {
    // ED A0 80 encodes a UTF-16 surrogate; invalid as UTF-8.
    let counts = count(&[0xED, 0xA0, 0x80], ByteOrderMark::Utf8);
    assert_eq!(counts.triple_byte, 0);
    assert_eq!(counts.weighted_sum(), 3);
}

#[test]
fn test_chunked_matches_whole() {
    let text = "héllo wörld 😀€𐍈 plain tail".as_bytes();
    let whole = count(text, ByteOrderMark::Utf8);
    for chunk in [1, 2, 3, 5, 7] {
        assert_eq!(count_chunked(text, ByteOrderMark::Utf8, chunk), whole);
    }
}

#[test]
fn test_utf16_fixed_width() {
    // Three complete units plus one truncated byte.
    let counts = count(&[0x41, 0x00, 0x42, 0x00, 0x43, 0x00, 0x44], ByteOrderMark::Utf16Le);
    assert_eq!(counts.double_byte, 3);
    assert_eq!(counts.invalid_bytes, 1);
    assert_eq!(counts.weighted_sum(), 7);
}

#[test]
fn test_utf32_fixed_width() {
    let counts = count(&[0; 10], ByteOrderMark::Utf32Be);
    assert_eq!(counts.quad_byte, 2);
    assert_eq!(counts.invalid_bytes, 2);
    assert_eq!(counts.weighted_sum(), 10);
}

#[test]
fn test_utf16_chunked() {
    let bytes: Vec<u8> = (0..9).collect();
    let whole = count(&bytes, ByteOrderMark::Utf16Le);
    for chunk in [1, 2, 3] {
        assert_eq!(count_chunked(&bytes, ByteOrderMark::Utf16Le, chunk), whole);
    }
}

#[test]
fn test_accumulate_frequency() {
    let mut profile = [0u64; 256];
    accumulate_frequency(&mut profile, b"aabbbc");
    accumulate_frequency(&mut profile, b"c\xff");
    assert_eq!(profile[b'a' as usize], 2);
    assert_eq!(profile[b'b' as usize], 3);
    assert_eq!(profile[b'c' as usize], 2);
    assert_eq!(profile[0xff], 1);
    assert_eq!(profile.iter().sum::<u64>(), 8);
}
