//! Tests for byte transforms and bit shifts

use crate::error::EditError;
use crate::transform::{
    apply_byte_transform, apply_byte_transform_to_file, left_shift_buffer, mask_byte,
    right_shift_buffer, MaskKind,
};
use std::io::Write;

const FILL: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[test]
fn test_apply_byte_transform_in_place() {
    let mut bytes = b"Hello World!".to_vec();
    apply_byte_transform(&mut bytes, |b| b.to_ascii_uppercase());
    assert_eq!(&bytes, b"HELLO WORLD!");
    apply_byte_transform(&mut bytes, |b| b.to_ascii_lowercase());
    assert_eq!(&bytes, b"hello world!");
    apply_byte_transform(&mut bytes[..1], |b| b.to_ascii_uppercase());
    assert_eq!(&bytes, b"Hello world!");
}

#[test]
fn test_mask_byte() {
    assert_eq!(mask_byte(0b1010, 0b0110, MaskKind::And), 0b0010);
    assert_eq!(mask_byte(0b1010, 0b0110, MaskKind::Or), 0b1110);
    assert_eq!(mask_byte(0b1010, 0b0110, MaskKind::Xor), 0b1100);
    // XOR by the same mask twice is the identity.
    let b = 0xA7;
    assert_eq!(mask_byte(mask_byte(b, 0xFF, MaskKind::Xor), 0xFF, MaskKind::Xor), b);
}

#[test]
fn test_shift_preconditions() {
    let mut buf = FILL.to_vec();
    assert!(matches!(
        left_shift_buffer(&mut buf, 8, 0),
        Err(EditError::InvalidShift { .. })
    ));
    assert!(right_shift_buffer(&mut buf, 8, 0).is_err());
    assert!(left_shift_buffer(&mut buf, 0, 1).is_err());
    assert!(right_shift_buffer(&mut buf, 0, 1).is_err());
    assert!(left_shift_buffer(&mut buf, 4, 2).is_err());
    assert!(right_shift_buffer(&mut buf, 4, 2).is_err());
    // Buffer untouched by rejected shifts.
    assert_eq!(buf, FILL);
}

#[test]
fn test_right_shift_full_byte() {
    // 3 + 5 = 8 bits total: the whole buffer moves one byte right.
    let mut buf = FILL.to_vec();
    right_shift_buffer(&mut buf, 3, 0).unwrap();
    right_shift_buffer(&mut buf, 5, 0).unwrap();
    assert_eq!(buf[0], 0);
    assert_eq!(&buf[1..], &FILL[..FILL.len() - 1]);
}

#[test]
fn test_right_shift_full_byte_ones_fill() {
    let mut buf = FILL.to_vec();
    right_shift_buffer(&mut buf, 3, 1).unwrap();
    right_shift_buffer(&mut buf, 5, 1).unwrap();
    assert_eq!(buf[0], 0xFF);
    assert_eq!(&buf[1..], &FILL[..FILL.len() - 1]);
}

#[test]
fn test_left_shift_full_byte() {
    let mut buf = FILL.to_vec();
    left_shift_buffer(&mut buf, 2, 0).unwrap();
    left_shift_buffer(&mut buf, 6, 0).unwrap();
    assert_eq!(&buf[..FILL.len() - 1], &FILL[1..]);
    assert_eq!(buf[FILL.len() - 1], 0);
}

#[test]
fn test_left_shift_full_byte_ones_fill() {
    let mut buf = FILL.to_vec();
    left_shift_buffer(&mut buf, 2, 1).unwrap();
    left_shift_buffer(&mut buf, 6, 1).unwrap();
    assert_eq!(&buf[..FILL.len() - 1], &FILL[1..]);
    assert_eq!(buf[FILL.len() - 1], 0xFF);
}

#[test]
fn test_shift_bit_patterns() {
    let mut buf = b"ABCD".to_vec();
    right_shift_buffer(&mut buf, 2, 0).unwrap();
    assert_eq!(buf, [0x10, 0x50, 0x90, 0xD1]);

    let mut buf = b"WXYZ".to_vec();
    right_shift_buffer(&mut buf, 4, 1).unwrap();
    assert_eq!(buf, [0xF5, 0x75, 0x85, 0x95]);

    let mut buf = b"1234".to_vec();
    left_shift_buffer(&mut buf, 3, 0).unwrap();
    assert_eq!(buf, [0x89, 0x91, 0x99, 0xA0]);

    let mut buf = b"abcd".to_vec();
    left_shift_buffer(&mut buf, 7, 1).unwrap();
    assert_eq!(buf, [0xB1, 0x31, 0xB2, 0x7F]);
}

#[test]
fn test_file_transform_whole() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.dat");
    let out_path = dir.path().join("out.dat");
    std::fs::write(&in_path, FILL).unwrap();

    apply_byte_transform_to_file(&in_path, &out_path, |b| b.to_ascii_uppercase(), 0, 0).unwrap();
    let out = std::fs::read(&out_path).unwrap();
    assert_eq!(out, FILL.to_ascii_uppercase());
}

#[test]
fn test_file_transform_range_only() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.dat");
    let out_path = dir.path().join("out.dat");
    std::fs::write(&in_path, FILL).unwrap();

    apply_byte_transform_to_file(&in_path, &out_path, |b| b.to_ascii_lowercase(), 37, 10).unwrap();
    let out = std::fs::read(&out_path).unwrap();
    let mut expected = FILL.to_vec();
    expected[37..47].make_ascii_lowercase();
    assert_eq!(out, expected);
}

#[test]
fn test_file_transform_range_error_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.dat");
    let out_path = dir.path().join("out.dat");
    std::fs::write(&in_path, FILL).unwrap();

    let result = apply_byte_transform_to_file(&in_path, &out_path, |b| b, 37, 100);
    assert!(matches!(result, Err(EditError::Range { .. })));
    assert!(!out_path.exists());
}

#[test]
fn test_file_transform_overwrites_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.dat");
    let out_path = dir.path().join("out.dat");
    std::fs::write(&in_path, b"fresh").unwrap();
    let mut stale = std::fs::File::create(&out_path).unwrap();
    stale.write_all(b"stale contents").unwrap();
    drop(stale);

    apply_byte_transform_to_file(&in_path, &out_path, |b| b, 0, 0).unwrap();
    assert_eq!(std::fs::read(&out_path).unwrap(), b"fresh");
}
