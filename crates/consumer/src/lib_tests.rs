// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use hss_core::{Action, ActionKey, EventType, Fid, Mdt};
use hss_stream::{FakeStreamStore, RawEntry};
use std::sync::atomic::AtomicU32;

fn event(mdt: &str) -> StreamEvent {
    StreamEvent {
        event_type: EventType::New,
        mdt: Mdt::new(mdt),
        cat_idx: Some(1),
        rec_idx: Some(1),
        fid: Some(Fid::new("0x1")),
        action: Some(Action::Archive),
        status: None,
        action_key: ActionKey::new(&Fid::new("0x1"), &Action::Archive),
        timestamp: 1,
        raw: Some("line".to_string()),
        source: None,
    }
}

#[tokio::test]
async fn discovery_seeds_cursors_at_zero_when_from_beginning() {
    let store = Arc::new(FakeStreamStore::new());
    store.append_batch("hsm:actions:MDT0000", &[event("MDT0000")]).await.unwrap();

    let mut reader = ConsumerReader::new(Arc::clone(&store), "hsm:actions", true, 0, Shutdown::new());
    reader.discover().await.unwrap();
    assert_eq!(reader.cursors.get("hsm:actions:MDT0000"), Some(&"0-0".to_string()));
}

#[tokio::test]
async fn discovery_seeds_cursors_at_dollar_when_not_from_beginning() {
    let store = Arc::new(FakeStreamStore::new());
    store.append_batch("hsm:actions:MDT0000", &[event("MDT0000")]).await.unwrap();

    let mut reader = ConsumerReader::new(Arc::clone(&store), "hsm:actions", false, 0, Shutdown::new());
    reader.discover().await.unwrap();
    assert_eq!(reader.cursors.get("hsm:actions:MDT0000"), Some(&"$".to_string()));
}

#[tokio::test]
async fn bootstrap_emits_history_exhausted_exactly_once() {
    let store = Arc::new(FakeStreamStore::new());
    store.append_batch("hsm:actions:MDT0000", &[event("MDT0000")]).await.unwrap();

    let mut reader = ConsumerReader::new(Arc::clone(&store), "hsm:actions", true, 0, Shutdown::new());

    let first = reader.recv().await.unwrap().unwrap();
    assert!(matches!(first, ConsumerItem::Event { .. }));

    let second = reader.recv().await.unwrap().unwrap();
    assert_eq!(second, ConsumerItem::HistoryExhausted);
}

#[tokio::test]
async fn events_are_never_replayed_after_history_exhausted() {
    let store = Arc::new(FakeStreamStore::new());
    store.append_batch("hsm:actions:MDT0000", &[event("MDT0000")]).await.unwrap();

    let mut reader = ConsumerReader::new(Arc::clone(&store), "hsm:actions", true, 0, Shutdown::new());
    let mut saw_exhausted = false;
    for _ in 0..2 {
        match reader.recv().await.unwrap().unwrap() {
            ConsumerItem::HistoryExhausted => saw_exhausted = true,
            ConsumerItem::Event { .. } => assert!(!saw_exhausted, "no events after the marker"),
        }
    }
    assert!(saw_exhausted);
}

#[tokio::test]
async fn recv_returns_none_once_shutdown_is_set() {
    let store = Arc::new(FakeStreamStore::new());
    let shutdown = Shutdown::new();
    shutdown.set();
    let mut reader = ConsumerReader::new(store, "hsm:actions", false, 0, shutdown);
    assert!(reader.recv().await.is_none());
}

#[tokio::test]
async fn is_connected_is_false_until_a_call_succeeds() {
    let store = Arc::new(FakeStreamStore::new());
    let reader = ConsumerReader::new(store, "hsm:actions", false, 0, Shutdown::new());
    assert!(!reader.is_connected());
}

#[derive(Clone)]
struct FlakyStore {
    inner: Arc<FakeStreamStore>,
    failures_left: Arc<AtomicU32>,
}

#[async_trait]
impl StreamStore for FlakyStore {
    async fn append_batch(&self, stream: &str, events: &[StreamEvent]) -> Result<Vec<String>, StreamError> {
        self.inner.append_batch(stream, events).await
    }

    async fn read_from(&self, stream: &str, after_id: &str, count: usize) -> Result<Vec<RawEntry>, StreamError> {
        self.inner.read_from(stream, after_id, count).await
    }

    async fn read_blocking(
        &self,
        cursors: &[(String, String)],
        block_ms: Option<u64>,
    ) -> Result<Vec<(String, Vec<RawEntry>)>, StreamError> {
        self.inner.read_blocking(cursors, block_ms).await
    }

    async fn trim_minid(&self, stream: &str, min_id: &str, approximate: bool, limit: u64) -> Result<u64, StreamError> {
        self.inner.trim_minid(stream, min_id, approximate, limit).await
    }

    async fn trim_all(&self, stream: &str, limit: u64) -> Result<u64, StreamError> {
        self.inner.trim_all(stream, limit).await
    }

    async fn discover_streams(&self, prefix: &str) -> Result<Vec<String>, StreamError> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(StreamError::Unavailable("simulated outage".to_string()));
        }
        self.inner.discover_streams(prefix).await
    }

    async fn len(&self, stream: &str) -> Result<u64, StreamError> {
        self.inner.len(stream).await
    }
}

#[tokio::test(start_paused = true)]
async fn discovery_recovers_after_transient_failures_via_backoff() {
    let inner = Arc::new(FakeStreamStore::new());
    inner.append_batch("hsm:actions:MDT0000", &[event("MDT0000")]).await.unwrap();
    let flaky = Arc::new(FlakyStore {
        inner,
        failures_left: Arc::new(AtomicU32::new(2)),
    });

    let mut reader = ConsumerReader::new(flaky, "hsm:actions", false, 0, Shutdown::new());
    assert!(reader.discover().await.is_some());
    assert!(reader.is_connected());
    assert!(reader.cursors.contains_key("hsm:actions:MDT0000"));
}

#[derive(Clone)]
struct FlakyReadStore {
    inner: Arc<FakeStreamStore>,
    read_failures_left: Arc<AtomicU32>,
}

#[async_trait]
impl StreamStore for FlakyReadStore {
    async fn append_batch(&self, stream: &str, events: &[StreamEvent]) -> Result<Vec<String>, StreamError> {
        self.inner.append_batch(stream, events).await
    }

    async fn read_from(&self, stream: &str, after_id: &str, count: usize) -> Result<Vec<RawEntry>, StreamError> {
        self.inner.read_from(stream, after_id, count).await
    }

    async fn read_blocking(
        &self,
        cursors: &[(String, String)],
        block_ms: Option<u64>,
    ) -> Result<Vec<(String, Vec<RawEntry>)>, StreamError> {
        if self.read_failures_left.load(Ordering::SeqCst) > 0 {
            self.read_failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(StreamError::Unavailable("simulated outage".to_string()));
        }
        self.inner.read_blocking(cursors, block_ms).await
    }

    async fn trim_minid(&self, stream: &str, min_id: &str, approximate: bool, limit: u64) -> Result<u64, StreamError> {
        self.inner.trim_minid(stream, min_id, approximate, limit).await
    }

    async fn trim_all(&self, stream: &str, limit: u64) -> Result<u64, StreamError> {
        self.inner.trim_all(stream, limit).await
    }

    async fn discover_streams(&self, prefix: &str) -> Result<Vec<String>, StreamError> {
        self.inner.discover_streams(prefix).await
    }

    async fn len(&self, stream: &str) -> Result<u64, StreamError> {
        self.inner.len(stream).await
    }
}

/// Reproduces the scenario from the bug this reader used to have: a stream
/// is created only *after* the reader's last successful discovery, while a
/// transient read failure is forcing a reconnect. Unless the reconnect path
/// clears `discovered`, `recv()` never scans the key namespace again and the
/// new stream is never picked up.
#[tokio::test(start_paused = true)]
async fn recv_rediscovers_a_stream_created_during_a_reconnect_cycle() {
    let inner = Arc::new(FakeStreamStore::new());
    let flaky = Arc::new(FlakyReadStore {
        inner: Arc::clone(&inner),
        read_failures_left: Arc::new(AtomicU32::new(1)),
    });

    let mut reader = ConsumerReader::new(Arc::clone(&flaky), "hsm:actions", false, 0, Shutdown::new());

    // First discovery finds nothing; the stream doesn't exist yet.
    assert!(reader.discover().await.is_some());
    assert!(reader.cursors.is_empty());

    // The stream appears while the reader is about to hit a transient read
    // failure on its (still empty) cursor set.
    inner.append_batch("hsm:actions:MDT0000", &[event("MDT0000")]).await.unwrap();

    assert!(reader.blocking_round().await.is_some());
    assert!(
        !reader.discovered,
        "a transient read failure must force rediscovery on the next recv() iteration"
    );

    let item = reader.recv().await.unwrap().unwrap();
    assert!(matches!(item, ConsumerItem::Event { .. }));
    assert!(
        reader.cursors.contains_key("hsm:actions:MDT0000"),
        "the stream created during the outage is picked up once the reader reconnects"
    );
}
