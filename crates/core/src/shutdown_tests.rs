// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn is_set_false_until_set_is_called() {
    let shutdown = Shutdown::new();
    assert!(!shutdown.is_set());
    shutdown.set();
    assert!(shutdown.is_set());
}

#[tokio::test]
async fn wait_resolves_immediately_if_already_set() {
    let shutdown = Shutdown::new();
    shutdown.set();
    tokio::time::timeout(Duration::from_millis(50), shutdown.wait())
        .await
        .expect("wait should not block once already set");
}

#[tokio::test]
async fn wait_resolves_once_another_clone_calls_set() {
    let shutdown = Shutdown::new();
    let other = shutdown.clone();

    let waiter = tokio::spawn(async move {
        other.wait().await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.set();

    tokio::time::timeout(Duration::from_millis(200), waiter)
        .await
        .expect("waiter task should finish after set")
        .expect("waiter task should not panic");
}

#[tokio::test]
async fn sleep_or_shutdown_returns_early_on_shutdown() {
    let shutdown = Shutdown::new();
    let other = shutdown.clone();

    let sleeper = tokio::spawn(async move {
        other.sleep_or_shutdown(Duration::from_secs(3600)).await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.set();

    tokio::time::timeout(Duration::from_millis(200), sleeper)
        .await
        .expect("sleeper should wake early once shutdown fires")
        .expect("sleeper task should not panic");
}

#[tokio::test]
async fn sleep_or_shutdown_elapses_normally_without_shutdown() {
    let shutdown = Shutdown::new();
    let started = tokio::time::Instant::now();
    shutdown.sleep_or_shutdown(Duration::from_millis(20)).await;
    assert!(started.elapsed() >= Duration::from_millis(20));
}
