// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn missing_file_is_empty_and_unstable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does_not_exist");
    let (data, stable) = read_file_safely(&path);
    assert!(data.is_empty());
    assert!(!stable);
}

#[test]
fn unchanged_file_reads_as_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("actions");
    std::fs::write(&path, b"idx=[1/2]\n").unwrap();
    let (data, stable) = read_file_safely(&path);
    assert_eq!(data, b"idx=[1/2]\n");
    assert!(stable);
}
