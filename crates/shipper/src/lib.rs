// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The shipper loop: one poll cycle scans every MDT's action-log snapshot,
//! diffs it against the scan cache, and ships NEW/UPDATE/PURGED events to
//! the per-MDT Redis stream before advancing the cache.
//!
//! A cycle never advances the cache for an MDT whose events failed to ship,
//! and never purges a key belonging to an MDT whose snapshot read was
//! unstable this cycle (a file that vanished or changed under us). Both
//! are re-derived correctly on the next cycle instead.

mod hash;
mod read;

use hash::hash_line;
use hss_cache::{CacheError, ScanCache};
use hss_config::Config;
use hss_core::{ActionKey, CacheEntry, CacheKey, EventType, Mdt, StreamEvent};
use hss_stream::{StreamError, StreamStore};
use read::read_file_safely;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShipperError {
    #[error("failed to persist scan cache: {0}")]
    CachePersist(#[from] CacheError),
}

/// Summary of one completed poll cycle, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub discovered_mdts: HashSet<Mdt>,
    pub unstable_mdts: HashSet<Mdt>,
    pub events_shipped: usize,
    pub mdts_failed_to_ship: HashSet<Mdt>,
}

/// Runs one full poll cycle against every file matching
/// `config.mdt_watch_glob`, shipping diffs through `store` and mutating
/// `cache` in place. `now` is the event timestamp to stamp onto every
/// emitted event (epoch seconds); callers pass it in rather than this
/// crate reading the clock, so a cycle is reproducible in tests.
pub async fn run_poll_cycle<S: StreamStore>(
    cache: &mut ScanCache,
    config: &Config,
    store: &S,
    now: u64,
) -> Result<CycleReport, ShipperError> {
    let paths = enumerate_mdt_logs(&config.mdt_watch_glob);

    let mut discovered_mdts = HashSet::new();
    let mut unstable_mdts = HashSet::new();
    let mut keys_seen: HashSet<CacheKey> = HashSet::new();
    let mut events_by_mdt: HashMap<Mdt, Vec<StreamEvent>> = HashMap::new();
    let mut pending: HashMap<CacheKey, Option<CacheEntry>> = HashMap::new();

    for path in &paths {
        let Some(mdt) = mdt_name_for(path) else {
            tracing::warn!(?path, "matched path has no grandparent directory, skipping");
            continue;
        };
        discovered_mdts.insert(mdt.clone());

        let (content, stable) = read_file_safely(path);
        if !stable {
            unstable_mdts.insert(mdt.clone());
        }

        let text = String::from_utf8_lossy(&content);
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(record) = hss_core::parse_line(line) else {
                tracing::warn!(%mdt, %line, "unparseable action log line, skipping");
                continue;
            };

            let (Some(fid), Some(action)) = (&record.fid, &record.action) else {
                tracing::warn!(%mdt, %line, "action log line has no fid or action, skipping");
                continue;
            };

            let key = CacheKey::new(mdt.clone(), record.cat_idx, record.rec_idx);
            keys_seen.insert(key.clone());

            let hash = hash_line(line);
            let previously_seen = cache.get(&key);
            if previously_seen.is_some_and(|entry| entry.hash == hash) {
                continue;
            }

            let event_type = if previously_seen.is_some() {
                EventType::Update
            } else {
                EventType::New
            };

            let action_key = ActionKey::new(fid, action);

            pending.insert(
                key,
                Some(CacheEntry {
                    hash,
                    action: record.action.clone(),
                    fid: record.fid.clone(),
                    action_key: action_key.clone(),
                }),
            );

            events_by_mdt.entry(mdt.clone()).or_default().push(StreamEvent {
                event_type,
                mdt: mdt.clone(),
                cat_idx: Some(record.cat_idx),
                rec_idx: Some(record.rec_idx),
                fid: record.fid,
                action: record.action,
                status: record.status,
                action_key,
                timestamp: now,
                raw: Some(line.to_string()),
                source: None,
            });
        }
    }

    for key in cache.keys().cloned().collect::<Vec<_>>() {
        if keys_seen.contains(&key) {
            continue;
        }
        if unstable_mdts.contains(&key.mdt) {
            continue;
        }

        let cached = cache.get(&key).cloned();
        pending.insert(key.clone(), None);

        let (fid, action, action_key) = match &cached {
            Some(entry) => (
                entry.fid.clone(),
                entry.action.clone(),
                entry.action_key.clone(),
            ),
            None => (None, None, ActionKey::synthesize_unknown(key.cat_idx, key.rec_idx)),
        };

        events_by_mdt.entry(key.mdt.clone()).or_default().push(StreamEvent {
            event_type: EventType::Purged,
            mdt: key.mdt.clone(),
            cat_idx: Some(key.cat_idx),
            rec_idx: Some(key.rec_idx),
            fid,
            action,
            status: Some(hss_core::Status::Purged),
            action_key,
            timestamp: now,
            raw: None,
            source: None,
        });
    }

    let mut events_shipped = 0usize;
    let mut mdts_failed_to_ship = HashSet::new();

    for (mdt, events) in &events_by_mdt {
        if events.is_empty() {
            continue;
        }
        let stream = config.stream_name(mdt);
        match store.append_batch(&stream, events).await {
            Ok(ids) => events_shipped += ids.len(),
            Err(err) => {
                log_append_failure(mdt, &err);
                mdts_failed_to_ship.insert(mdt.clone());
                pending.retain(|key, _| &key.mdt != mdt);
            }
        }
    }

    let cache_changed = !pending.is_empty();
    for (key, maybe_entry) in pending {
        match maybe_entry {
            Some(entry) => cache.insert(key, entry),
            None => {
                cache.remove(&key);
            }
        }
    }

    if cache_changed {
        cache.save_atomic(&config.cache_path)?;
    }

    Ok(CycleReport {
        discovered_mdts,
        unstable_mdts,
        events_shipped,
        mdts_failed_to_ship,
    })
}

fn log_append_failure(mdt: &Mdt, err: &StreamError) {
    tracing::error!(%mdt, %err, "failed to ship events; cache left untouched for this MDT");
}

fn enumerate_mdt_logs(pattern: &str) -> Vec<PathBuf> {
    let paths = match glob::glob(pattern) {
        Ok(paths) => paths,
        Err(err) => {
            tracing::error!(%err, %pattern, "invalid mdt_watch_glob pattern");
            return Vec::new();
        }
    };

    let entries: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(%err, "error while enumerating mdt_watch_glob matches");
                None
            }
        })
        .collect();

    if entries.is_empty() {
        tracing::warn!(%pattern, "no files matched mdt_watch_glob");
    }
    entries
}

/// The MDT name is the matched path's grandparent directory name, e.g.
/// `/mnt/MDT0000/changelog/actions` -> `MDT0000`.
fn mdt_name_for(path: &std::path::Path) -> Option<Mdt> {
    let name = path.parent()?.parent()?.file_name()?.to_str()?;
    Some(Mdt::new(name))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
