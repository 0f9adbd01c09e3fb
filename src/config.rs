// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::fetcher::{DEFAULT_FETCH_TIMEOUT, DEFAULT_UPSTREAM_URL};
use crate::window::DEFAULT_CAPACITY;

pub const ENV_CONFIG_PATH: &str = "NUMBERS_CONFIG_PATH";
pub const ENV_WINDOW_SIZE: &str = "NUMBERS_WINDOW_SIZE";
pub const ENV_UPSTREAM_URL: &str = "NUMBERS_UPSTREAM_URL";
pub const ENV_FETCH_TIMEOUT_MS: &str = "NUMBERS_FETCH_TIMEOUT_MS";
pub const ENV_BIND_ADDR: &str = "NUMBERS_BIND_ADDR";
pub const ENV_METRICS: &str = "NUMBERS_METRICS";

pub const DEFAULT_CONFIG_PATH: &str = "config/numbers.toml";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9876";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub window_size: usize,
    pub upstream_url: String,
    pub fetch_timeout_ms: u64,
    pub bind_addr: String,
    /// Mount `/metrics` and install the Prometheus recorder.
    pub metrics: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_CAPACITY,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            metrics: false,
        }
    }
}

impl ServiceConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Load from an explicit TOML file. Missing keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading service config from {}", path.display()))?;
        let mut cfg: ServiceConfig = toml::from_str(&content)
            .with_context(|| format!("parsing service config {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Resolve config the way the binary does:
    /// 1) $NUMBERS_CONFIG_PATH (must exist if set)
    /// 2) config/numbers.toml
    /// 3) built-in defaults
    ///
    /// then apply `NUMBERS_*` env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
            if pb.exists() {
                Self::load_from(&pb)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Apply `NUMBERS_*` overrides. Invalid values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Some(n) = parse_env::<usize>(ENV_WINDOW_SIZE).filter(|&n| n > 0) {
            self.window_size = n;
        }
        if let Ok(url) = std::env::var(ENV_UPSTREAM_URL) {
            if !url.trim().is_empty() {
                self.upstream_url = url.trim().to_string();
            }
        }
        if let Some(ms) = parse_env::<u64>(ENV_FETCH_TIMEOUT_MS).filter(|&ms| ms > 0) {
            self.fetch_timeout_ms = ms;
        }
        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var(ENV_METRICS) {
            self.metrics = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    fn sanitize(&mut self) {
        if self.window_size == 0 {
            warn!("window_size = 0 in config; using default {DEFAULT_CAPACITY}");
            self.window_size = DEFAULT_CAPACITY;
        }
        if self.fetch_timeout_ms == 0 {
            warn!("fetch_timeout_ms = 0 in config; using default");
            self.fetch_timeout_ms = DEFAULT_FETCH_TIMEOUT.as_millis() as u64;
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}
