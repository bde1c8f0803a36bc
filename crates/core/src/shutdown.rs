// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A cooperative shutdown flag shared between the shipper loop, the
//! maintenance loop, and the daemon's signal handler.
//!
//! Two access patterns are needed side by side: the shipper sleeps between
//! poll cycles and must wake immediately on shutdown, while the maintenance
//! loop checks in between MDTs and between trim chunks without blocking on
//! anything. [`Shutdown::is_set`] serves the poll case; [`Shutdown::notified`]
//! serves the sleep case.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// Cheaply cloneable; every clone observes the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<Inner>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks shutdown as requested and wakes every task parked in
    /// [`Shutdown::wait`] or [`Shutdown::sleep_or_shutdown`].
    pub fn set(&self) {
        self.0.flag.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.0.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`Shutdown::set`] has been called. If it already has,
    /// resolves immediately.
    pub async fn wait(&self) {
        if self.is_set() {
            return;
        }
        let notified = self.0.notify.notified();
        if self.is_set() {
            return;
        }
        notified.await;
    }

    /// Sleeps for `duration` unless shutdown fires first, in which case it
    /// returns early. Mirrors a `threading.Event.wait(timeout)` poll loop,
    /// but without the busy-wait: the shipper's between-cycle sleep uses
    /// this so a shutdown request during a long idle period is honored
    /// immediately instead of after the sleep finishes.
    pub async fn sleep_or_shutdown(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.wait() => {}
        }
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
