// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hss_core::{Action, ActionKey, Fid, Mdt};

fn sample_entry() -> CacheEntry {
    CacheEntry {
        hash: 0x1234_5678_9abc_def0_1234_5678_9abc_def0,
        action: Some(Action::Archive),
        fid: Some(Fid::new("0xa")),
        action_key: ActionKey::new(&Fid::new("0xa"), &Action::Archive),
    }
}

#[test]
fn load_of_missing_file_returns_empty_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan_cache.json");
    let cache = ScanCache::load(&path);
    assert!(cache.is_empty());
}

#[test]
fn load_of_corrupt_file_returns_empty_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan_cache.json");
    std::fs::write(&path, b"not json at all").unwrap();
    let cache = ScanCache::load(&path);
    assert!(cache.is_empty());
}

#[test]
fn save_then_load_round_trips_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("scan_cache.json");

    let mut cache = ScanCache::new();
    let key = CacheKey::new(Mdt::new("MDT0000"), 517, 31144);
    cache.insert(key.clone(), sample_entry());
    cache.save_atomic(&path).unwrap();

    let reloaded = ScanCache::load(&path);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.get(&key), Some(&sample_entry()));
}

#[test]
fn save_atomic_leaves_no_tmp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan_cache.json");
    let mut cache = ScanCache::new();
    cache.insert(CacheKey::new(Mdt::new("MDT0000"), 1, 1), sample_entry());
    cache.save_atomic(&path).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn save_on_disk_uses_colon_joined_string_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan_cache.json");
    let mut cache = ScanCache::new();
    cache.insert(CacheKey::new(Mdt::new("MDT0000"), 517, 31144), sample_entry());
    cache.save_atomic(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value.as_object().unwrap().contains_key("MDT0000:517:31144"));
}

#[test]
fn keys_for_mdt_filters_by_mdt() {
    let mut cache = ScanCache::new();
    cache.insert(CacheKey::new(Mdt::new("MDT0000"), 1, 1), sample_entry());
    cache.insert(CacheKey::new(Mdt::new("MDT0001"), 2, 2), sample_entry());

    let mdt0 = Mdt::new("MDT0000");
    let matched: Vec<_> = cache.keys_for_mdt(&mdt0).collect();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].mdt, mdt0);
}

#[test]
fn remove_drops_the_entry() {
    let mut cache = ScanCache::new();
    let key = CacheKey::new(Mdt::new("MDT0000"), 1, 1);
    cache.insert(key.clone(), sample_entry());
    assert!(cache.remove(&key).is_some());
    assert!(cache.get(&key).is_none());
}
