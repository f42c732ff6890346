//! HTTP fetcher implementation
//!
//! This module performs single network retrievals for the crawler:
//! - Building HTTP clients with the configured user agent and headers
//! - GET requests with a per-request timeout
//! - Classification of failures into timeout, connection, HTTP status and
//!   rate-limit kinds
//!
//! There is no retry logic here; see [`crate::crawler::RetryPolicy`].

use crate::config::{CrawlerConfig, FetchConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// A successfully retrieved page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,

    /// Page body content
    pub body: String,
}

/// Why a single fetch attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("rate limited (retry after {0:?})")]
    RateLimited(Option<Duration>),
}

/// Coarse failure taxonomy used for run bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Expected to resolve on retry; the unit stays eligible for later runs
    TransientNetwork,

    /// A client error other than rate limiting; retrying will not help
    PermanentRequest,
}

impl FetchError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::HttpStatus(code) if !is_server_error(*code) => FailureClass::PermanentRequest,
            _ => FailureClass::TransientNetwork,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::TransientNetwork
    }
}

fn is_server_error(code: u16) -> bool {
    (500..600).contains(&code)
}

/// Single-attempt page retrieval
///
/// Implementations may be a plain HTTP client or anything else that can turn
/// a URL into a body, as long as failures map onto [`FetchError`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `fetch` - User agent and extra headers
/// * `crawler` - Supplies the request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    fetch: &FetchConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in &fetch.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Ignoring invalid header {}: {}", name, value),
        }
    }

    Client::builder()
        .user_agent(fetch.user_agent.clone())
        .default_headers(headers)
        .timeout(crawler.timeout())
        .connect_timeout(crawler.timeout())
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the client from configuration
    pub fn from_config(
        fetch: &FetchConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(fetch, crawler)?))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify_error)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            return Err(FetchError::RateLimited(retry_after));
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(classify_error)?;
        Ok(FetchedPage {
            status: status.as_u16(),
            body,
        })
    }
}

/// Maps a transport error onto a fetch failure kind
fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = error.status() {
        FetchError::HttpStatus(status.as_u16())
    } else {
        FetchError::Connection(error.to_string())
    }
}

/// Parses a `Retry-After` value: delta-seconds or an HTTP date
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
