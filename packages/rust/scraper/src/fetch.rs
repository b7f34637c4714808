//! Rate-limited, retried HTTP acquisition of listing documents.
//!
//! A [`Fetcher`] owns one configured `reqwest::Client` reused across all
//! requests of a run. The client and its connection pool are released when
//! the run scope drops the fetcher, on success and failure alike.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use tenderscrape_shared::{Result, ScrapeConfig, TenderScrapeError};

use crate::retry::RetryPolicy;

/// Base delay for the fetch retry backoff.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Enforces a minimum start-to-start interval between requests, scoped to
/// one fetcher instance.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for `rate_limit` requests per second.
    /// A non-positive rate disables the wait.
    pub fn new(rate_limit: f64) -> Self {
        let min_interval = if rate_limit > 0.0 {
            Duration::from_secs_f64(1.0 / rate_limit)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    /// Sleep until the minimum interval since the previous request start
    /// has elapsed, then stamp the new request start.
    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_start.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// HTTP method for API-style listing fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
}

impl std::fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// Rate-limited, retrying HTTP fetcher for one scrape run.
pub struct Fetcher {
    client: Client,
    base_url: Url,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Build a fetcher from the run configuration.
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(referer) = HeaderValue::from_str(config.base_url.as_str()) {
            headers.insert(REFERER, referer);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                TenderScrapeError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            limiter: RateLimiter::new(config.rate_limit),
            retry: RetryPolicy::new(config.max_retries, RETRY_BASE_DELAY),
        })
    }

    /// Fetch a page and return its body as text.
    pub async fn fetch_page(&self, url: &Url) -> Result<String> {
        self.retry
            .run("fetch_page", || async move {
                self.limiter.wait().await;
                debug!(%url, "fetching page");

                let response = self
                    .client
                    .get(url.as_str())
                    .send()
                    .await
                    .map_err(|e| TenderScrapeError::Network(format!("{url}: {e}")))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(TenderScrapeError::Network(format!("{url}: HTTP {status}")));
                }

                response
                    .text()
                    .await
                    .map_err(|e| TenderScrapeError::Network(format!("{url}: body read failed: {e}")))
            })
            .await
    }

    /// Fetch JSON from an endpoint resolved against the base URL.
    ///
    /// POST sends `payload` (or `{}`) as the JSON body; GET sends it as
    /// query parameters when present.
    pub async fn fetch_api(
        &self,
        endpoint: &str,
        method: ApiMethod,
        payload: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = self.base_url.join(endpoint).map_err(|e| {
            TenderScrapeError::config(format!("invalid endpoint '{endpoint}': {e}"))
        })?;

        self.retry
            .run("fetch_api", || {
                let url = url.clone();
                async move {
                    self.limiter.wait().await;
                    debug!(%method, %url, "api call");

                    let request = match method {
                        ApiMethod::Post => {
                            let body = payload.cloned().unwrap_or_else(|| serde_json::json!({}));
                            self.client.post(url.as_str()).json(&body)
                        }
                        ApiMethod::Get => {
                            let mut builder = self.client.get(url.as_str());
                            if let Some(params) = payload {
                                builder = builder.query(params);
                            }
                            builder
                        }
                    };

                    let response = request
                        .send()
                        .await
                        .map_err(|e| TenderScrapeError::Network(format!("{url}: {e}")))?;

                    let status = response.status();
                    if !status.is_success() {
                        return Err(TenderScrapeError::Network(format!("{url}: HTTP {status}")));
                    }

                    response.json::<serde_json::Value>().await.map_err(|e| {
                        TenderScrapeError::Network(format!("{url}: invalid JSON body: {e}"))
                    })
                }
            })
            .await
    }
}
