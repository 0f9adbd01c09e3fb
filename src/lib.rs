// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod fetcher;
pub mod metrics;
pub mod window;

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tracing::info;

pub use crate::api::{router, AppState};
pub use crate::config::ServiceConfig;
pub use crate::fetcher::{HttpNumberSource, NumberSource};
pub use crate::window::{Observation, WindowStore};

/// Build the full router from configuration: a fresh window, the HTTP upstream
/// source and, when given, the `/metrics` route.
pub fn app(cfg: &ServiceConfig, metrics: Option<&crate::metrics::Metrics>) -> Result<Router> {
    let source = HttpNumberSource::new(&cfg.upstream_url, cfg.fetch_timeout())?;
    let window = Arc::new(WindowStore::with_capacity(cfg.window_size));

    info!(
        window_size = window.capacity(),
        upstream = %cfg.upstream_url,
        timeout_ms = cfg.fetch_timeout_ms,
        metrics = metrics.is_some(),
        "numbers window initialized"
    );

    let state = AppState::new(window, Arc::new(source));
    Ok(router(state, metrics))
}
