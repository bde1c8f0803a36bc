// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The consumer SDK: a pull-style reader over every stream matching a
//! prefix, round-robin delivered, reconnecting transparently on failure.
//!
//! Mirrors the teacher's `EventReader::recv()` shape rather than a boxed
//! `Stream`: callers loop calling [`ConsumerReader::recv`] themselves.

use hss_core::{Shutdown, StreamEvent};
use hss_stream::{StreamError, StreamStore};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("entry {stream}/{id} is corrupt: {reason}")]
    Corrupt {
        stream: String,
        id: String,
        reason: String,
    },
}

/// One unit handed back from [`ConsumerReader::recv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerItem {
    Event {
        stream: String,
        id: String,
        data: StreamEvent,
    },
    /// Emitted exactly once, only when reading `from_beginning`: every known
    /// stream has returned an empty non-blocking read, meaning the backlog
    /// is fully drained and subsequent events are live-tailed.
    HistoryExhausted,
}

/// Pull-style reader over every stream matching `{prefix}:*`.
pub struct ConsumerReader<S: StreamStore> {
    store: Arc<S>,
    prefix: String,
    from_beginning: bool,
    block_ms: u64,
    shutdown: Shutdown,
    cursors: HashMap<String, String>,
    discovered: bool,
    bootstrap_done: bool,
    pending: VecDeque<(String, hss_stream::RawEntry)>,
    is_connected: Arc<AtomicBool>,
}

impl<S: StreamStore> ConsumerReader<S> {
    /// `block_ms` follows the wire convention, not the low-level store's:
    /// `0` blocks indefinitely, any other value is a bounded timeout.
    pub fn new(
        store: Arc<S>,
        prefix: impl Into<String>,
        from_beginning: bool,
        block_ms: u64,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            from_beginning,
            block_ms,
            shutdown,
            cursors: HashMap::new(),
            discovered: false,
            bootstrap_done: !from_beginning,
            pending: VecDeque::new(),
            is_connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the last store operation succeeded. Cheap to poll from
    /// another task via a cloned handle.
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed)
    }

    /// Returns the next item, or `None` once shutdown has been signaled.
    /// Transparently retries on transient store errors with bounded
    /// exponential backoff; never returns a `Stream` error to the caller.
    pub async fn recv(&mut self) -> Option<Result<ConsumerItem, ConsumerError>> {
        loop {
            if self.shutdown.is_set() {
                return None;
            }

            if let Some((stream, entry)) = self.pending.pop_front() {
                return Some(self.decode_entry(stream, entry));
            }

            if !self.discovered {
                if self.discover().await.is_none() {
                    return None;
                }
            }

            if !self.bootstrap_done {
                match self.bootstrap_round().await {
                    None => return None,
                    Some(true) => continue,
                    Some(false) => {
                        self.bootstrap_done = true;
                        return Some(Ok(ConsumerItem::HistoryExhausted));
                    }
                }
            }

            if self.blocking_round().await.is_none() {
                return None;
            }
        }
    }

    fn decode_entry(
        &mut self,
        stream: String,
        entry: hss_stream::RawEntry,
    ) -> Result<ConsumerItem, ConsumerError> {
        self.cursors.insert(stream.clone(), entry.id.clone());
        match entry.decode() {
            Ok(data) => Ok(ConsumerItem::Event {
                stream,
                id: entry.id,
                data,
            }),
            Err(err) => Err(ConsumerError::Corrupt {
                stream,
                id: entry.id,
                reason: err.to_string(),
            }),
        }
    }

    /// Re-scans the key namespace, adding newly-found streams with a fresh
    /// cursor while leaving already-known streams' cursors untouched.
    async fn discover(&mut self) -> Option<()> {
        let mut backoff = INITIAL_BACKOFF;
        let names = loop {
            if self.shutdown.is_set() {
                return None;
            }
            let attempt = tokio::select! {
                result = self.store.discover_streams(&self.prefix) => result,
                _ = self.shutdown.wait() => return None,
            };
            match attempt {
                Ok(names) => {
                    self.is_connected.store(true, Ordering::Relaxed);
                    break names;
                }
                Err(err) => {
                    backoff = self.back_off(err, backoff).await?;
                }
            }
        };

        let initial_cursor = if self.from_beginning { "0-0" } else { "$" };
        for name in names {
            self.cursors.entry(name).or_insert_with(|| initial_cursor.to_string());
        }
        self.discovered = true;
        Some(())
    }

    /// One non-blocking round across every known stream. Returns `Some(true)`
    /// if at least one entry was found (and buffered into `pending`),
    /// `Some(false)` if every stream came back empty, `None` on shutdown.
    async fn bootstrap_round(&mut self) -> Option<bool> {
        let results = self.read_round(Some(0)).await?;
        let found = self.buffer_round_robin(results);
        Some(found)
    }

    /// One real blocking round, honoring the reader's configured `block_ms`.
    async fn blocking_round(&mut self) -> Option<()> {
        let store_block_ms = if self.block_ms == 0 { None } else { Some(self.block_ms) };
        let results = self.read_round(store_block_ms).await?;
        self.buffer_round_robin(results);
        Some(())
    }

    async fn read_round(
        &mut self,
        block_ms: Option<u64>,
    ) -> Option<Vec<(String, Vec<hss_stream::RawEntry>)>> {
        let cursors: Vec<(String, String)> =
            self.cursors.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let mut backoff = INITIAL_BACKOFF;
        loop {
            if self.shutdown.is_set() {
                return None;
            }
            let attempt = tokio::select! {
                result = self.store.read_blocking(&cursors, block_ms) => result,
                _ = self.shutdown.wait() => return None,
            };
            match attempt {
                Ok(results) => {
                    self.is_connected.store(true, Ordering::Relaxed);
                    return Some(results);
                }
                Err(err) => {
                    backoff = self.back_off(err, backoff).await?;
                }
            }
        }
    }

    /// Interleaves per-stream results one entry at a time (round-robin,
    /// never draining one stream before moving to the next) into `pending`.
    fn buffer_round_robin(&mut self, mut results: Vec<(String, Vec<hss_stream::RawEntry>)>) -> bool {
        let mut found = false;
        loop {
            let mut progressed = false;
            for (stream, entries) in results.iter_mut() {
                if let Some(entry) = entries.first().cloned() {
                    entries.remove(0);
                    self.pending.push_back((stream.clone(), entry));
                    progressed = true;
                    found = true;
                }
            }
            if !progressed {
                break;
            }
        }
        found
    }

    /// Marks the reader disconnected, logs, and sleeps out `backoff`
    /// (cancellable by shutdown), returning the next backoff to use or
    /// `None` if shutdown fired while waiting. Clears `discovered` so the
    /// next `recv()` iteration re-scans the key namespace on reconnect,
    /// picking up any stream created while this reader was down.
    async fn back_off(&mut self, err: StreamError, backoff: Duration) -> Option<Duration> {
        self.is_connected.store(false, Ordering::Relaxed);
        self.discovered = false;
        tracing::warn!(%err, backoff_secs = backoff.as_secs(), "consumer store call failed, backing off");
        self.shutdown.sleep_or_shutdown(backoff).await;
        if self.shutdown.is_set() {
            return None;
        }
        Some((backoff * 2).min(MAX_BACKOFF))
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
