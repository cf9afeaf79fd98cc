//! Tests for save path resolution

use crate::save::{available_path, paths_equivalent, SaveFlags};
use std::path::Path;

#[test]
fn test_available_path_free() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dat");
    assert_eq!(available_path(&path), path);
}

#[test]
fn test_available_path_occupied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dat");
    std::fs::write(&path, b"x").unwrap();
    assert_eq!(available_path(&path), dir.path().join("out-1.dat"));

    std::fs::write(dir.path().join("out-1.dat"), b"x").unwrap();
    std::fs::write(dir.path().join("out-2.dat"), b"x").unwrap();
    assert_eq!(available_path(&path), dir.path().join("out-3.dat"));
}

#[test]
fn test_available_path_no_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output");
    std::fs::write(&path, b"x").unwrap();
    assert_eq!(available_path(&path), dir.path().join("output-1"));
}

#[test]
fn test_paths_equivalent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.dat");
    std::fs::write(&path, b"x").unwrap();

    assert!(paths_equivalent(&path, &path));
    let indirect = dir.path().join(".").join("f.dat");
    assert!(paths_equivalent(&path, &indirect));
    assert!(!paths_equivalent(&path, Path::new("/nonexistent/other")));
}

#[test]
fn test_flags_default() {
    assert_eq!(SaveFlags::default(), SaveFlags::None);
}
