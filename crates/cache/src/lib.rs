// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The persistent scan cache: the shipper's durable record of what it last
//! shipped for every `(mdt, cat_idx, rec_idx)` it has seen.
//!
//! Written only by the shipper, via temp-file-plus-rename so a reader never
//! observes a partial file. Loading never fails outwardly — an unreadable
//! or corrupt cache just means the next cycle treats everything as new.

use hss_core::{CacheEntry, CacheKey};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error writing cache: {0}")]
    Io(#[from] std::io::Error),
    #[error("serializing cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// An in-memory map of everything the shipper last shipped, keyed by the
/// composite `(mdt, cat_idx, rec_idx)` the filesystem hands out.
#[derive(Debug, Clone, Default)]
pub struct ScanCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the cache file at `path`. Any I/O failure or parse error
    /// degrades to an empty cache — logged at `warn`, never surfaced as an
    /// error, since the shipper can always rebuild it from a fresh scan.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(cache)) => cache,
            Ok(None) => Self::new(),
            Err(err) => {
                tracing::warn!(?path, %err, "could not load scan cache, starting fresh");
                Self::new()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>, CacheError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(path)?;
        let serialized: HashMap<String, CacheEntry> = serde_json::from_slice(&raw)?;

        let mut entries = HashMap::with_capacity(serialized.len());
        for (key_str, entry) in serialized {
            match CacheKey::parse(&key_str) {
                Some(key) => {
                    entries.insert(key, entry);
                }
                None => {
                    tracing::warn!(key = %key_str, "dropping malformed cache key on load");
                }
            }
        }
        Ok(Some(Self { entries }))
    }

    /// Writes the cache to `path` via a sibling `.tmp` file, `sync_all`,
    /// then `rename` — the same write-tmp/fsync/rename ordering as the
    /// durable-write primitives elsewhere in this workspace.
    pub fn save_atomic(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized: HashMap<String, &CacheEntry> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.to_string(), entry))
            .collect();

        let tmp_path = path.with_extension("tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(&serde_json::to_vec(&serialized)?)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    /// All keys belonging to a single MDT, for scoping maintenance's
    /// ground-truth set to the MDT it is currently reconciling.
    pub fn keys_for_mdt<'a>(
        &'a self,
        mdt: &'a hss_core::Mdt,
    ) -> impl Iterator<Item = &'a CacheKey> + 'a {
        self.entries.keys().filter(move |key| &key.mdt == mdt)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
