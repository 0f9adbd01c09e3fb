//! Numbers window service: binary entrypoint.
//! Loads configuration, initializes tracing, binds the listener and serves the router.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use numbers_window::{app, metrics::Metrics, ServiceConfig};

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("numbers_window=info,tower_http=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = ServiceConfig::load_default()?;
    let metrics = if cfg.metrics {
        Some(Metrics::init()?)
    } else {
        None
    };
    let router = app(&cfg, metrics.as_ref())?;

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, "listening");

    axum::serve(listener, router)
        .await
        .context("http server terminated")?;
    Ok(())
}
