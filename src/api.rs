use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};

use crate::fetcher::NumberSource;
use crate::metrics::Metrics;
use crate::window::{Observation, WindowStore};

/// Shared handler state. The window is the only piece of cross-request mutable state.
#[derive(Clone)]
pub struct AppState {
    window: Arc<WindowStore>,
    source: Arc<dyn NumberSource>,
}

impl AppState {
    pub fn new(window: Arc<WindowStore>, source: Arc<dyn NumberSource>) -> Self {
        Self { window, source }
    }
}

pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/numbers/{qualifier}", get(numbers))
        .route("/window", get(window_info));

    if let Some(m) = metrics {
        app = app.merge(m.router());
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumbersResp {
    pub numbers: Vec<i64>,
    pub window_prev_state: Vec<i64>,
    pub window_curr_state: Vec<i64>,
    pub avg: f64,
}

impl NumbersResp {
    fn new(numbers: Vec<i64>, obs: Observation) -> Self {
        Self {
            numbers,
            window_prev_state: obs.previous,
            window_curr_state: obs.current,
            avg: obs.average,
        }
    }
}

const NUMBERS_PREFIX: &str = "/numbers/";

/// The qualifier is the raw path segment, still percent-encoded, so any byte
/// sequence reaches the source untouched.
async fn numbers(State(state): State<AppState>, uri: Uri) -> Response {
    let qualifier = uri.path().strip_prefix(NUMBERS_PREFIX).unwrap_or_default();

    // Fetch happens before the window lock is taken.
    let fetched = state.source.fetch(qualifier).await;
    let obs = state.window.observe(&fetched);
    debug!(
        qualifier,
        source = state.source.name(),
        fetched = fetched.len(),
        window_len = obs.current.len(),
        "observed batch"
    );

    json_response(&NumbersResp::new(fetched, obs))
}

/// Encode as JSON; a serialization failure becomes a bare 500.
pub fn json_response<T: Serialize>(body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WindowInfo {
    capacity: usize,
    window_curr_state: Vec<i64>,
    avg: f64,
}

async fn window_info(State(state): State<AppState>) -> Json<WindowInfo> {
    let snap = state.window.snapshot();
    Json(WindowInfo {
        capacity: state.window.capacity(),
        window_curr_state: snap.current,
        avg: snap.average,
    })
}
