// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hsm-shipperd
//!
//! Converts frequently-rewritten HSM action log files into durable
//! per-MDT Redis-stream event logs.
//!
//! Architecture:
//! - Shipper loop: polls the configured glob every `poll_interval`, diffing
//!   against the scan cache and appending events per MDT.
//! - Maintenance loop: consumes cache snapshots handed off by the shipper
//!   every `reconcile_interval`, reconciling each MDT's stream against them.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use hss_cache::ScanCache;
use hss_config::{Config, LogFormat};
use hss_core::{Mdt, Shutdown};
use hss_stream::{RedisConnector, RedisStreamStore};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "hsm-shipperd",
    version,
    about = "Ships HSM action log entries into per-MDT Redis streams"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: PathBuf,

    /// Run a single poll cycle, then exit.
    #[arg(long)]
    run_once: bool,

    /// With `--run-once`, also run a maintenance cycle against the same
    /// cycle's cache snapshot.
    #[arg(long)]
    maintenance_now: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    let _log_guard = setup_logging(&config);
    info!(config = %cli.config.display(), "starting hsm-shipperd");

    let connector = match RedisConnector::new(&config.redis_host, config.redis_port, config.redis_db) {
        Ok(connector) => connector,
        Err(err) => {
            error!(%err, "failed to construct redis connector");
            std::process::exit(1);
        }
    };
    let store = RedisStreamStore::new(connector);

    if cli.run_once {
        run_once(&config, &store, cli.maintenance_now).await;
        return;
    }

    run_daemon(config, store).await;
}

/// `--run-once` (and optionally `--maintenance-now`): exits 0 on success, 1
/// on any propagated error, matching the CLI surface's exit code table.
async fn run_once(config: &Config, store: &RedisStreamStore, maintenance_now: bool) {
    let mut cache = ScanCache::load(&config.cache_path);
    let now = unix_now();

    let report = match hss_shipper::run_poll_cycle(&mut cache, config, store, now).await {
        Ok(report) => report,
        Err(err) => {
            error!(%err, "poll cycle failed");
            std::process::exit(1);
        }
    };
    info!(
        events_shipped = report.events_shipped,
        discovered_mdts = report.discovered_mdts.len(),
        unstable_mdts = report.unstable_mdts.len(),
        "poll cycle complete"
    );

    if maintenance_now {
        let maintenance_report =
            hss_maintenance::run_maintenance_cycle(store, config, &cache, &report.discovered_mdts, now).await;
        for mdt_report in &maintenance_report.per_mdt {
            info!(
                mdt = %mdt_report.mdt,
                live_actions = mdt_report.live_actions,
                orphans_purged = mdt_report.orphans_purged,
                entries_trimmed = mdt_report.entries_trimmed,
                "maintenance cycle complete"
            );
        }
    }
}

/// Default mode: runs the shipper and maintenance loops side by side until
/// SIGINT/SIGTERM, handling double-SIGINT as a forced exit.
async fn run_daemon(config: Config, store: RedisStreamStore) {
    let shutdown = Shutdown::new();
    let cache = ScanCache::load(&config.cache_path);
    let store = Arc::new(store);
    let (tx, rx) = mpsc::channel(1);

    let shipper_handle = tokio::spawn(shipper_loop(
        cache,
        config.clone(),
        Arc::clone(&store),
        shutdown.clone(),
        tx,
    ));
    let maintenance_handle = tokio::spawn(maintenance_loop(rx, config.clone(), Arc::clone(&store)));

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(err) => {
            error!(%err, "failed to install SIGTERM handler");
            std::process::exit(1);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(sig) => sig,
        Err(err) => {
            error!(%err, "failed to install SIGINT handler");
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }
    shutdown.set();

    tokio::select! {
        _ = async {
            let _ = shipper_handle.await;
            let _ = maintenance_handle.await;
        } => {
            info!("daemon stopped");
        }
        _ = sigint.recv() => {
            warn!("received second SIGINT, forcing exit");
            std::process::exit(0);
        }
    }
}

async fn shipper_loop(
    mut cache: ScanCache,
    config: Config,
    store: Arc<RedisStreamStore>,
    shutdown: Shutdown,
    maintenance_tx: mpsc::Sender<(ScanCache, HashSet<Mdt>)>,
) {
    let poll_interval = Duration::from_secs(config.poll_interval);
    let reconcile_interval = Duration::from_secs(config.reconcile_interval);
    let mut last_trigger = Instant::now();
    let mut triggered_once = false;

    while !shutdown.is_set() {
        let now = unix_now();
        match hss_shipper::run_poll_cycle(&mut cache, &config, store.as_ref(), now).await {
            Ok(report) => {
                info!(events_shipped = report.events_shipped, "poll cycle complete");
                if !triggered_once || last_trigger.elapsed() >= reconcile_interval {
                    triggered_once = true;
                    last_trigger = Instant::now();
                    match maintenance_tx.try_send((cache.clone(), report.discovered_mdts.clone())) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!("maintenance handoff slot is full, dropping this trigger");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            error!("maintenance handoff channel closed");
                        }
                    }
                }
            }
            Err(err) => {
                error!(%err, "poll cycle failed, retrying next interval");
            }
        }
        shutdown.sleep_or_shutdown(poll_interval).await;
    }
}

async fn maintenance_loop(
    mut rx: mpsc::Receiver<(ScanCache, HashSet<Mdt>)>,
    config: Config,
    store: Arc<RedisStreamStore>,
) {
    while let Some((snapshot, mdts)) = rx.recv().await {
        let now = unix_now();
        let report = hss_maintenance::run_maintenance_cycle(store.as_ref(), &config, &snapshot, &mdts, now).await;
        for mdt_report in &report.per_mdt {
            info!(
                mdt = %mdt_report.mdt,
                live_actions = mdt_report.live_actions,
                orphans_purged = mdt_report.orphans_purged,
                entries_trimmed = mdt_report.entries_trimmed,
                "maintenance cycle complete"
            );
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn setup_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    match (&config.log_file, config.log_format) {
        (Some(path), LogFormat::Json) => {
            let (writer, guard) = file_writer(path);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(writer))
                .init();
            Some(guard)
        }
        (Some(path), LogFormat::Pretty) => {
            let (writer, guard) = file_writer(path);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(writer))
                .init();
            Some(guard)
        }
        (None, LogFormat::Json) => {
            tracing_subscriber::registry().with(filter).with(fmt::layer().json()).init();
            None
        }
        (None, LogFormat::Pretty) => {
            tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
            None
        }
    }
}

fn file_writer(
    path: &Path,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let appender = tracing_appender::rolling::never(
        path.parent().unwrap_or_else(|| Path::new(".")),
        path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("hsm-shipperd.log")),
    );
    tracing_appender::non_blocking(appender)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
