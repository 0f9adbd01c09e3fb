// src/fetcher.rs
//! Upstream number sources.
//!
//! A source never fails from the caller's point of view: transport errors,
//! timeouts and undecodable bodies all come back as an empty batch.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_UPSTREAM_URL: &str = "http://20.244.56.144/test";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(500);

#[async_trait]
pub trait NumberSource: Send + Sync {
    /// Fetch the batch for `qualifier`. Empty on any failure.
    async fn fetch(&self, qualifier: &str) -> Vec<i64>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct UpstreamBody {
    #[serde(default)]
    numbers: Vec<i64>,
}

/// Fetches `GET <base>/<qualifier>` and reads `{ "numbers": [...] }`.
#[derive(Debug, Clone)]
pub struct HttpNumberSource {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpNumberSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building upstream http client")?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("parsing upstream base url {base_url:?}"))?;
        Ok(Self { base_url, client })
    }

    /// Upstream URL with `qualifier` as the last path segment.
    ///
    /// The qualifier is expected as it appeared in the inbound path: existing
    /// `%XX` escapes pass through, while `/`, `?` and `#` are escaped so the
    /// qualifier always stays a single segment.
    pub fn url_for(&self, qualifier: &str) -> Url {
        let segment = qualifier.replace('/', "%2F");
        let mut url = self.base_url.clone();
        let path = format!("{}/{}", url.path().trim_end_matches('/'), segment);
        url.set_path(&path);
        url
    }

    async fn try_fetch(&self, url: Url) -> Result<Vec<i64>, FetchError> {
        let resp = self.client.get(url).send().await.map_err(FetchError::from)?;
        debug!(status = %resp.status(), url = %resp.url(), "upstream responded");
        let body: UpstreamBody = resp.json().await.map_err(FetchError::from)?;
        Ok(body.numbers)
    }
}

#[async_trait]
impl NumberSource for HttpNumberSource {
    async fn fetch(&self, qualifier: &str) -> Vec<i64> {
        let url = self.url_for(qualifier);
        let t0 = Instant::now();
        let res = self.try_fetch(url).await;
        histogram!("numbers_fetch_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(numbers) => {
                counter!("numbers_fetched_total").increment(numbers.len() as u64);
                numbers
            }
            Err(e) => {
                counter!("numbers_fetch_failures_total", "reason" => e.reason()).increment(1);
                warn!(qualifier, reason = e.reason(), error = %e.0, "upstream fetch failed; using empty batch");
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

struct FetchError(reqwest::Error);

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self(e)
    }
}

impl FetchError {
    fn reason(&self) -> &'static str {
        if self.0.is_timeout() {
            "timeout"
        } else if self.0.is_decode() {
            "decode"
        } else if self.0.is_connect() {
            "connect"
        } else {
            "transport"
        }
    }
}
