// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The stream-store seam: every place the shipper, maintenance loop, and
//! consumer SDK touch the durable event log goes through this trait, never
//! through `redis` directly. Keeps the diff/replay/reconcile logic testable
//! without a live Redis server.

use async_trait::async_trait;
use hss_core::StreamEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed entry {id} in stream: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("trim failed: {0}")]
    TrimFailure(String),
    #[error("failed to encode event: {0}")]
    Encode(String),
}

/// One entry read back off a stream: the store-assigned ID and the
/// still-undecoded `data` field payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: String,
    pub data: String,
}

impl RawEntry {
    /// Decodes the wire payload. A failure here is always reported to the
    /// caller as `StreamCorrupt`; the read cursor must still advance past
    /// this entry regardless of the outcome.
    pub fn decode(&self) -> Result<StreamEvent, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// The append/replay/trim/discover surface the shipper, maintenance loop,
/// and consumer SDK need from a Redis-Streams-shaped store.
#[async_trait]
pub trait StreamStore: Send + Sync + 'static {
    /// Appends a batch of events to `stream` as a single pipeline, all or
    /// nothing, returning one store-assigned ID per event in order. The
    /// shipper relies on this being atomic: a partial failure must not
    /// leave the cache believing some events shipped when they didn't.
    async fn append_batch(
        &self,
        stream: &str,
        events: &[StreamEvent],
    ) -> Result<Vec<String>, StreamError>;

    /// Reads up to `count` entries with an ID strictly greater than
    /// `after_id`. An empty result means nothing newer is available right
    /// now, not that the stream is empty.
    async fn read_from(
        &self,
        stream: &str,
        after_id: &str,
        count: usize,
    ) -> Result<Vec<RawEntry>, StreamError>;

    /// Blocking multi-stream read used by the consumer SDK. `cursors` pairs
    /// each stream name with its last-seen ID (`"$"` for "only new").
    /// `block_ms` of `None` blocks indefinitely; `Some(0)` never blocks.
    async fn read_blocking(
        &self,
        cursors: &[(String, String)],
        block_ms: Option<u64>,
    ) -> Result<Vec<(String, Vec<RawEntry>)>, StreamError>;

    /// One `XTRIM MINID [~] min_id LIMIT limit` call. Returns the number of
    /// entries this single call deleted; callers loop until it returns 0.
    async fn trim_minid(
        &self,
        stream: &str,
        min_id: &str,
        approximate: bool,
        limit: u64,
    ) -> Result<u64, StreamError>;

    /// One `XTRIM MAXLEN 0 LIMIT limit` call (full-history clear).
    async fn trim_all(&self, stream: &str, limit: u64) -> Result<u64, StreamError>;

    /// Lists stream keys matching `"{prefix}:*"`.
    async fn discover_streams(&self, prefix: &str) -> Result<Vec<String>, StreamError>;

    /// Current entry count. Used by stats-style consumers and by tests.
    async fn len(&self, stream: &str) -> Result<u64, StreamError>;
}
