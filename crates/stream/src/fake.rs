// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`StreamStore`] for deterministic tests: no network, no
//! real time, IDs assigned by a simple monotonic counter instead of
//! Redis's `ms-seq` clock-derived ones.

use crate::store::{RawEntry, StreamError, StreamStore};
use async_trait::async_trait;
use hss_core::StreamEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct State {
    streams: HashMap<String, Vec<RawEntry>>,
    next_id: u64,
}

/// Cheaply cloneable; every clone shares the same underlying streams.
#[derive(Clone, Default)]
pub struct FakeStreamStore {
    inner: Arc<Mutex<State>>,
}

impl FakeStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended to `stream` so far, for assertions.
    pub fn entries(&self, stream: &str) -> Vec<RawEntry> {
        self.inner
            .lock()
            .streams
            .get(stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces the most recently appended entry's payload with invalid
    /// JSON, for exercising malformed-entry handling without a live Redis
    /// server returning a genuinely corrupt record.
    pub fn corrupt_last_entry(&self, stream: &str) {
        if let Some(entry) = self.inner.lock().streams.get_mut(stream).and_then(|v| v.last_mut()) {
            entry.data = "not valid json".to_string();
        }
    }
}

fn parse_id(id: &str) -> (u64, u64) {
    let mut parts = id.splitn(2, '-');
    let ms = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let seq = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (ms, seq)
}

#[async_trait]
impl StreamStore for FakeStreamStore {
    async fn append_batch(
        &self,
        stream: &str,
        events: &[StreamEvent],
    ) -> Result<Vec<String>, StreamError> {
        let mut state = self.inner.lock();
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            state.next_id += 1;
            let id = format!("{}-0", state.next_id);
            let data =
                serde_json::to_string(event).map_err(|err| StreamError::Encode(err.to_string()))?;
            state
                .streams
                .entry(stream.to_string())
                .or_default()
                .push(RawEntry { id: id.clone(), data });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn read_from(
        &self,
        stream: &str,
        after_id: &str,
        count: usize,
    ) -> Result<Vec<RawEntry>, StreamError> {
        let state = self.inner.lock();
        let after = parse_id(after_id);
        Ok(state
            .streams
            .get(stream)
            .into_iter()
            .flatten()
            .filter(|entry| parse_id(&entry.id) > after)
            .take(count)
            .cloned()
            .collect())
    }

    async fn read_blocking(
        &self,
        cursors: &[(String, String)],
        _block_ms: Option<u64>,
    ) -> Result<Vec<(String, Vec<RawEntry>)>, StreamError> {
        // The fake never actually blocks: it just returns whatever is
        // available right now, which is enough to drive the consumer SDK's
        // non-blocking and history-exhausted code paths in tests.
        let state = self.inner.lock();
        Ok(cursors
            .iter()
            .map(|(stream, after_id)| {
                let after = parse_id(after_id);
                let matched = state
                    .streams
                    .get(stream)
                    .into_iter()
                    .flatten()
                    .filter(|entry| parse_id(&entry.id) > after)
                    .cloned()
                    .collect();
                (stream.clone(), matched)
            })
            .collect())
    }

    async fn trim_minid(
        &self,
        stream: &str,
        min_id: &str,
        _approximate: bool,
        limit: u64,
    ) -> Result<u64, StreamError> {
        let mut state = self.inner.lock();
        let min = parse_id(min_id);
        let entries = state.streams.entry(stream.to_string()).or_default();
        let mut deleted = 0u64;
        while deleted < limit {
            match entries.first() {
                Some(entry) if parse_id(&entry.id) < min => {
                    entries.remove(0);
                    deleted += 1;
                }
                _ => break,
            }
        }
        Ok(deleted)
    }

    async fn trim_all(&self, stream: &str, limit: u64) -> Result<u64, StreamError> {
        let mut state = self.inner.lock();
        let entries = state.streams.entry(stream.to_string()).or_default();
        let deleted = entries.len().min(limit as usize);
        entries.drain(0..deleted);
        Ok(deleted as u64)
    }

    async fn discover_streams(&self, prefix: &str) -> Result<Vec<String>, StreamError> {
        let state = self.inner.lock();
        let pattern = format!("{prefix}:");
        let mut names: Vec<String> = state
            .streams
            .keys()
            .filter(|key| key.starts_with(&pattern))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn len(&self, stream: &str) -> Result<u64, StreamError> {
        let state = self.inner.lock();
        Ok(state.streams.get(stream).map_or(0, |v| v.len() as u64))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
