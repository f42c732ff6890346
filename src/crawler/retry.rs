//! Bounded retry with linear backoff
//!
//! | Failure | Action |
//! |---------|--------|
//! | HTTP 4xx (not 429) | Give up immediately |
//! | HTTP 429 with Retry-After | Sleep exactly the hinted duration |
//! | Timeout, connection error, HTTP 5xx, 429 without hint | Sleep `base_delay × attempt` |
//!
//! Every unit of work fails closed after `max_attempts`.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FailureClass, FetchError};
use std::future::Future;
use std::time::Duration;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given duration, then try again
    Retry(Duration),

    /// Propagate the failure to the caller
    GiveUp,
}

/// Retry parameters shared by both crawl phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy; at least one attempt is always made
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.max_retries, config.base_delay())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Linear backoff after the given 1-based attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Decides whether the failure of 1-based `attempt` is retried
    pub fn decide(&self, error: &FetchError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        match error {
            _ if error.class() == FailureClass::PermanentRequest => RetryDecision::GiveUp,
            FetchError::RateLimited(Some(retry_after)) => RetryDecision::Retry(*retry_after),
            _ => RetryDecision::Retry(self.backoff_for(attempt)),
        }
    }

    /// Runs `operation` until it succeeds or the policy gives up
    ///
    /// Backoff sleeps suspend only the calling task. The final failure is
    /// returned unchanged so the caller can classify it.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.decide(&error, attempt) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        "{} failed ({}), retrying in {:?} (attempt {}/{})",
                        label,
                        error,
                        delay,
                        attempt,
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    tracing::debug!(
                        "{} failed ({}) after {} attempt(s), giving up",
                        label,
                        error,
                        attempt
                    );
                    return Err(error);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}
