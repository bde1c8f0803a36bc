// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Configuration loading for the shipper daemon: a TOML file, a fixed set
//! of recognized keys, and defaults for everything that has one.

use hss_core::Mdt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("missing required config key: '{0}'")]
    MissingKey(&'static str),
    #[error("invalid value for '{key}': '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Every recognized configuration key, defaulted or resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mdt_watch_glob: String,
    pub cache_path: PathBuf,
    pub poll_interval: u64,
    pub reconcile_interval: u64,
    pub trim_chunk_size: u64,
    pub use_approximate_trimming: bool,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,
    pub redis_stream_prefix: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub log_format: LogFormat,
    pub replay_chunk_size: usize,
}

impl Config {
    /// Loads and validates the config file at `path`, rewriting the
    /// deprecated `aggressive_trim_threshold` key to `trim_chunk_size`
    /// (with a warning) and filling in defaults for every optional key.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut raw: RawConfig = toml::from_str(text)?;

        if raw.trim_chunk_size.is_none() {
            if let Some(legacy) = raw.aggressive_trim_threshold.take() {
                tracing::warn!(
                    "config key 'aggressive_trim_threshold' is deprecated, rewriting to 'trim_chunk_size'"
                );
                raw.trim_chunk_size = Some(legacy);
            }
        }

        let log_format = match raw.log_format.as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "log_format",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            mdt_watch_glob: raw.mdt_watch_glob.ok_or(ConfigError::MissingKey("mdt_watch_glob"))?,
            cache_path: raw.cache_path.ok_or(ConfigError::MissingKey("cache_path"))?,
            poll_interval: raw.poll_interval.ok_or(ConfigError::MissingKey("poll_interval"))?,
            reconcile_interval: raw
                .reconcile_interval
                .ok_or(ConfigError::MissingKey("reconcile_interval"))?,
            trim_chunk_size: raw.trim_chunk_size.unwrap_or(1000),
            use_approximate_trimming: raw.use_approximate_trimming.unwrap_or(true),
            redis_host: raw.redis_host.ok_or(ConfigError::MissingKey("redis_host"))?,
            redis_port: raw.redis_port.ok_or(ConfigError::MissingKey("redis_port"))?,
            redis_db: raw.redis_db.ok_or(ConfigError::MissingKey("redis_db"))?,
            redis_stream_prefix: raw
                .redis_stream_prefix
                .ok_or(ConfigError::MissingKey("redis_stream_prefix"))?,
            log_level: raw.log_level.unwrap_or_else(|| "info".to_string()),
            log_file: raw.log_file,
            log_format,
            replay_chunk_size: raw.replay_chunk_size.unwrap_or(1000),
        })
    }

    /// The per-MDT stream name: `"{redis_stream_prefix}:{mdt}"`.
    pub fn stream_name(&self, mdt: &Mdt) -> String {
        format!("{}:{}", self.redis_stream_prefix, mdt)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    mdt_watch_glob: Option<String>,
    cache_path: Option<PathBuf>,
    poll_interval: Option<u64>,
    reconcile_interval: Option<u64>,
    trim_chunk_size: Option<u64>,
    aggressive_trim_threshold: Option<u64>,
    use_approximate_trimming: Option<bool>,
    redis_host: Option<String>,
    redis_port: Option<u16>,
    redis_db: Option<i64>,
    redis_stream_prefix: Option<String>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    log_format: Option<String>,
    replay_chunk_size: Option<usize>,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
