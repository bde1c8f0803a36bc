// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis Streams-backed [`StreamStore`], plus [`RedisConnector`]: the
//! lazily-connecting, reconnect-serializing wrapper every worker holds one
//! of, per the one-connector-per-worker rule.
//!
//! `redis::aio::ConnectionManager` already retries failed commands with
//! bounded exponential backoff internally, so unlike the connector this was
//! modeled on, this one doesn't hand-roll a reconnect loop — it only
//! serializes the single initial connect (or reconnect-after-invalidate) so
//! concurrent callers don't race to dial Redis at the same time.

use crate::store::{RawEntry, StreamError, StreamStore};
use async_trait::async_trait;
use hss_core::StreamEvent;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::Mutex as AsyncMutex;

/// Owns the lazy connection and reconnect serialization for one worker.
/// Cheap to clone: cloning shares the same underlying connect-once slot.
#[derive(Clone)]
pub struct RedisConnector {
    client: redis::Client,
    manager: std::sync::Arc<AsyncMutex<Option<ConnectionManager>>>,
}

impl RedisConnector {
    pub fn new(host: &str, port: u16, db: i64) -> Result<Self, StreamError> {
        let url = format!("redis://{host}:{port}/{db}");
        let client = redis::Client::open(url).map_err(|err| StreamError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            manager: std::sync::Arc::new(AsyncMutex::new(None)),
        })
    }

    /// Returns a cheap clone of the shared connection manager, connecting
    /// on first use. Once connected, callers never need to come back
    /// through this lock — `ConnectionManager` handles reconnection for
    /// every subsequent command on its own.
    pub async fn connection(&self) -> Result<ConnectionManager, StreamError> {
        let mut guard = self.manager.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_connection_manager()
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Drops the cached manager so the next [`RedisConnector::connection`]
    /// call dials fresh. Used when a caller has independent evidence the
    /// manager is wedged (e.g. every command on it has failed for a while).
    pub async fn invalidate(&self) {
        *self.manager.lock().await = None;
    }
}

pub struct RedisStreamStore {
    connector: RedisConnector,
}

impl RedisStreamStore {
    pub fn new(connector: RedisConnector) -> Self {
        Self { connector }
    }

    async fn connection(&self) -> Result<ConnectionManager, StreamError> {
        self.connector.connection().await
    }
}

fn entries_from(reply: StreamReadReply, stream: &str) -> Vec<RawEntry> {
    reply
        .keys
        .into_iter()
        .filter(|key| key.key == stream)
        .flat_map(|key| key.ids)
        .filter_map(|entry| {
            let data = entry
                .map
                .get("data")
                .and_then(|value| redis::from_redis_value::<String>(value).ok())?;
            Some(RawEntry { id: entry.id, data })
        })
        .collect()
}

#[async_trait]
impl StreamStore for RedisStreamStore {
    async fn append_batch(
        &self,
        stream: &str,
        events: &[StreamEvent],
    ) -> Result<Vec<String>, StreamError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for event in events {
            let payload = serde_json::to_string(event).map_err(|err| StreamError::Encode(err.to_string()))?;
            pipe.cmd("XADD").arg(stream).arg("*").arg("data").arg(payload);
        }
        pipe.query_async(&mut conn)
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))
    }

    async fn read_from(
        &self,
        stream: &str,
        after_id: &str,
        count: usize,
    ) -> Result<Vec<RawEntry>, StreamError> {
        let mut conn = self.connection().await?;
        let opts = StreamReadOptions::default().count(count);
        let reply: StreamReadReply = conn
            .xread_options(&[stream], &[after_id], &opts)
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))?;
        Ok(entries_from(reply, stream))
    }

    async fn read_blocking(
        &self,
        cursors: &[(String, String)],
        block_ms: Option<u64>,
    ) -> Result<Vec<(String, Vec<RawEntry>)>, StreamError> {
        if cursors.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let keys: Vec<&str> = cursors.iter().map(|(name, _)| name.as_str()).collect();
        let ids: Vec<&str> = cursors.iter().map(|(_, id)| id.as_str()).collect();

        let opts = match block_ms {
            Some(0) => StreamReadOptions::default(),
            Some(ms) => StreamReadOptions::default().block(ms as usize),
            None => StreamReadOptions::default().block(0),
        };

        let reply: StreamReadReply = conn
            .xread_options(&keys, &ids, &opts)
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))?;

        Ok(reply
            .keys
            .into_iter()
            .map(|key| {
                let entries = key
                    .ids
                    .into_iter()
                    .filter_map(|entry| {
                        let data = entry
                            .map
                            .get("data")
                            .and_then(|value| redis::from_redis_value::<String>(value).ok())?;
                        Some(RawEntry { id: entry.id, data })
                    })
                    .collect();
                (key.key, entries)
            })
            .collect())
    }

    async fn trim_minid(
        &self,
        stream: &str,
        min_id: &str,
        approximate: bool,
        limit: u64,
    ) -> Result<u64, StreamError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("XTRIM");
        cmd.arg(stream).arg("MINID");
        if approximate {
            cmd.arg("~").arg(min_id).arg("LIMIT").arg(limit);
        } else {
            cmd.arg(min_id);
        }
        cmd.query_async(&mut conn)
            .await
            .map_err(|err| StreamError::TrimFailure(err.to_string()))
    }

    async fn trim_all(&self, stream: &str, limit: u64) -> Result<u64, StreamError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("XTRIM");
        cmd.arg(stream).arg("MAXLEN").arg(0).arg("LIMIT").arg(limit);
        cmd.query_async(&mut conn)
            .await
            .map_err(|err| StreamError::TrimFailure(err.to_string()))
    }

    async fn discover_streams(&self, prefix: &str) -> Result<Vec<String>, StreamError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{prefix}:*");
        let mut cursor: u64 = 0;
        let mut names = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(1000)
                .arg("TYPE")
                .arg("stream")
                .query_async(&mut conn)
                .await
                .map_err(|err| StreamError::Unavailable(err.to_string()))?;
            names.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn len(&self, stream: &str) -> Result<u64, StreamError> {
        let mut conn = self.connection().await?;
        redis::cmd("XLEN")
            .arg(stream)
            .query_async(&mut conn)
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))
    }
}
