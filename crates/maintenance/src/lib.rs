// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The maintenance loop: per managed MDT, replay the stream to rebuild
//! live-action state, reconcile it against the shipper's cache snapshot by
//! injecting corrective `PURGED` events for orphans, then trim everything
//! older than the oldest remaining live reference.
//!
//! Runs independently of the shipper loop, triggered by the bounded
//! handoff in [`hss_core::Shutdown`]'s sibling, the single-slot
//! `tokio::sync::mpsc` channel wired up in `hss-daemon`.

use hss_cache::ScanCache;
use hss_config::Config;
use hss_core::{ActionKey, EventType, Mdt, Status, StreamEvent};
use hss_stream::{StreamError, StreamStore};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Number of chunked-trim loop iterations after which a warning is logged
/// to signal an unusually large backlog. The loop itself is unbounded —
/// this only affects logging, never correctness.
const WARN_AFTER_LOOPS: u64 = 100;

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("stream error during maintenance: {0}")]
    Stream(#[from] StreamError),
}

/// Per-MDT outcome of one maintenance pass, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdtReport {
    pub mdt: Mdt,
    pub live_actions: usize,
    pub orphans_purged: usize,
    pub entries_trimmed: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub per_mdt: Vec<MdtReport>,
}

fn live_action_keys_for_mdt(cache_snapshot: &ScanCache, mdt: &Mdt) -> HashSet<ActionKey> {
    cache_snapshot
        .keys_for_mdt(mdt)
        .filter_map(|key| cache_snapshot.get(key))
        .map(|entry| entry.action_key.clone())
        .collect()
}

/// Runs one full maintenance cycle over every MDT in `mdts`, reconciling
/// against `cache_snapshot` (a point-in-time snapshot of the shipper's scan
/// cache, handed off through the bounded shipper/maintenance channel). A
/// failure on any single MDT is logged and skipped; it never aborts the
/// rest of the cycle.
pub async fn run_maintenance_cycle<S: StreamStore>(
    store: &S,
    config: &Config,
    cache_snapshot: &ScanCache,
    mdts: &HashSet<Mdt>,
    now: u64,
) -> MaintenanceReport {
    let mut per_mdt = Vec::new();
    for mdt in mdts {
        tracing::info!(%mdt, "starting maintenance cycle");
        match run_one_mdt(store, config, cache_snapshot, mdt, now).await {
            Ok(report) => per_mdt.push(report),
            Err(err) => {
                tracing::warn!(%mdt, %err, "skipping maintenance for this MDT this cycle");
            }
        }
    }
    MaintenanceReport { per_mdt }
}

async fn run_one_mdt<S: StreamStore>(
    store: &S,
    config: &Config,
    cache_snapshot: &ScanCache,
    mdt: &Mdt,
    now: u64,
) -> Result<MdtReport, MaintenanceError> {
    let stream = config.stream_name(mdt);

    let mut live = replay(store, &stream, config.replay_chunk_size).await?;

    let truth = live_action_keys_for_mdt(cache_snapshot, mdt);
    let orphans: Vec<ActionKey> = live
        .keys()
        .filter(|key| !truth.contains(*key))
        .cloned()
        .collect();

    let orphans_purged = if orphans.is_empty() {
        0
    } else {
        tracing::warn!(%mdt, count = orphans.len(), "found orphaned action(s), injecting corrective PURGED events");
        let events: Vec<StreamEvent> = orphans
            .iter()
            .map(|action_key| StreamEvent {
                event_type: EventType::Purged,
                mdt: mdt.clone(),
                cat_idx: None,
                rec_idx: None,
                fid: None,
                action: None,
                status: Some(Status::Purged),
                action_key: action_key.clone(),
                timestamp: now,
                raw: None,
                source: Some("maintenance".to_string()),
            })
            .collect();
        store.append_batch(&stream, &events).await?;
        for action_key in &orphans {
            live.remove(action_key);
        }
        orphans.len()
    };

    let oldest_id = live.values().min_by_key(|id| parse_stream_id(id)).cloned();
    let entries_trimmed = trim_loop(store, &stream, oldest_id, config).await?;

    Ok(MdtReport {
        mdt: mdt.clone(),
        live_actions: live.len(),
        orphans_purged,
        entries_trimmed,
    })
}

/// Replays `stream` from the beginning in chunks, folding NEW/UPDATE/PURGED
/// events into a live `action_key -> stream_id` map. A malformed entry is
/// logged and skipped, but the read cursor still advances past it.
async fn replay<S: StreamStore>(
    store: &S,
    stream: &str,
    chunk_size: usize,
) -> Result<HashMap<ActionKey, String>, MaintenanceError> {
    let mut live = HashMap::new();
    let mut cursor = "0-0".to_string();

    loop {
        let entries = store.read_from(stream, &cursor, chunk_size).await?;
        if entries.is_empty() {
            break;
        }
        for entry in &entries {
            cursor = entry.id.clone();
            match entry.decode() {
                Ok(event) => match event.event_type {
                    EventType::New | EventType::Update => {
                        live.insert(event.action_key, entry.id.clone());
                    }
                    EventType::Purged => {
                        live.remove(&event.action_key);
                    }
                },
                Err(err) => {
                    tracing::warn!(%stream, id = %entry.id, %err, "skipping malformed stream entry during replay");
                }
            }
        }
    }

    Ok(live)
}

/// Chunked `XTRIM` loop: `min_id = Some(id)` trims by MINID, `None` clears
/// the whole stream (MAXLEN 0). Loops until a single call deletes nothing,
/// warning once after [`WARN_AFTER_LOOPS`] iterations.
async fn trim_loop<S: StreamStore>(
    store: &S,
    stream: &str,
    min_id: Option<String>,
    config: &Config,
) -> Result<u64, MaintenanceError> {
    let mut total = 0u64;
    let mut loops = 0u64;

    loop {
        loops += 1;
        let deleted = match &min_id {
            Some(id) => {
                store
                    .trim_minid(stream, id, config.use_approximate_trimming, config.trim_chunk_size)
                    .await?
            }
            None => store.trim_all(stream, config.trim_chunk_size).await?,
        };

        if deleted == 0 {
            break;
        }
        total += deleted;

        if loops == WARN_AFTER_LOOPS {
            tracing::warn!(%stream, loops, "trim has run many iterations, this stream has a very large backlog");
        }
    }

    Ok(total)
}

fn parse_stream_id(id: &str) -> (u64, u64) {
    let mut parts = id.splitn(2, '-');
    let ms = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let seq = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (ms, seq)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
