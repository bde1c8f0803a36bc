// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hss-stream: the durable per-MDT event stream, and the trait boundary
//! that keeps the shipper/maintenance/consumer logic testable without a
//! live Redis server.

mod redis_store;
mod store;

pub use redis_store::{RedisConnector, RedisStreamStore};
pub use store::{RawEntry, StreamError, StreamStore};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeStreamStore;
