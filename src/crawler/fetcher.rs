//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building an HTTP client with a per-request rotating user agent
//! - GET requests that return the page body for parsing
//! - JSON POST requests for the phone-number lookup
//! - An explicit retry wrapper applied to every network call
//! - Error classification (timeouts are reported distinctly)

use crate::config::HttpConfig;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Desktop browser identities rotated across requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// Errors produced by a single network call or by retry exhaustion
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request exceeded the configured total timeout
    #[error("timeout")]
    Timeout { url: String },

    /// Connection-level failure (refused, reset, DNS, TLS)
    #[error("request failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    /// The server answered with a non-success status code
    #[error("unexpected status {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be read or decoded
    #[error("body decode failed: {message}")]
    Decode { url: String, message: String },

    /// All configured attempts failed; terminal, never retried further
    #[error("all {attempts} attempts failed for {url}")]
    Exhausted { url: String, attempts: u32 },
}

/// Retry and timeout policy applied to every network call
///
/// Read once at startup from the `[http]` config section and shared by both
/// scraping stages.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per logical request, first try included
    pub attempts_limit: u32,

    /// Sleep between consecutive attempts
    pub attempt_delay: Duration,

    /// Total per-request timeout; elapsing counts as a failed attempt
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            attempts_limit: config.attempts_limit,
            attempt_delay: Duration::from_millis(config.attempt_delay_ms),
            request_timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Picks a user agent for the next request
fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Builds the HTTP client shared by all requests of a run
///
/// The user agent is intentionally not set here; it rotates per request.
pub fn build_http_client(policy: &RetryPolicy) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(policy.request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Runs `call` until it succeeds or the attempt budget is spent
///
/// Every failed attempt is logged at warn level with the attempt number, the
/// operation name, the failure reason (timeouts render as the literal
/// "timeout") and the target URL. After the final failure the wrapper returns
/// [`FetchError::Exhausted`] instead of the last underlying error; callers
/// treat that as a missing result, not a fatal one.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    target: &str,
    mut call: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    for attempt in 1..=policy.attempts_limit {
        match call().await {
            Ok(value) => return Ok(value),
            Err(reason) => {
                tracing::warn!(
                    "request failed, attempt: {} of {}, op: [{}], reason: \"{}\", target: {}",
                    attempt,
                    policy.attempts_limit,
                    operation,
                    reason,
                    target
                );
            }
        }

        if attempt < policy.attempts_limit {
            tokio::time::sleep(policy.attempt_delay).await;
        }
    }

    Err(FetchError::Exhausted {
        url: target.to_string(),
        attempts: policy.attempts_limit,
    })
}

/// Retry-wrapped HTTP operations used by both scraping stages
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Creates a fetcher with the given policy
    pub fn new(policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&policy)?;
        Ok(Self { client, policy })
    }

    /// Fetches a URL and returns its body text, retrying per policy
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Response body of a successful (2xx) response
    /// * `Err(FetchError::Exhausted)` - Every attempt failed
    pub async fn fetch_document(&self, url: &str) -> Result<String, FetchError> {
        with_retry(&self.policy, "fetch_document", url, || self.get_text(url)).await
    }

    /// POSTs a JSON body and returns the decoded JSON response, retrying per policy
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        with_retry(&self.policy, "post_json", url, || self.post_once(url, body)).await
    }

    /// One GET attempt, no retry
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// One POST attempt, no retry
    async fn post_once(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        let response = self
            .client
            .post(url)
            .header(USER_AGENT, random_user_agent())
            .json(body)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Maps a transport-level reqwest error to the fetch taxonomy
fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: error,
        }
    }
}
