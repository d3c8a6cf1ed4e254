//! Retry with exponential backoff, layered over the fetch function

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchResult;
use crate::fetch::FetchFn;
use crate::plugins::core::{FetchContext, Phase, Plugin};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Base delay between retries in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Response statuses that are retried like a retryable error
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            retry_statuses: vec![502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (zero-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let delay_ms = if delay_ms.is_finite() {
            (delay_ms as u64).min(self.max_delay_ms)
        } else {
            self.max_delay_ms
        };
        Duration::from_millis(delay_ms)
    }
}

/// Plugin that re-invokes the wrapped fetch function on retryable failures
///
/// Errors for which [`FetchError::is_retryable`](crate::FetchError::is_retryable)
/// is false are returned immediately. When attempts run out, the last error
/// or response is returned as-is.
#[derive(Debug, Clone)]
pub struct RetryPlugin {
    config: Arc<RetryConfig>,
}

impl RetryPlugin {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for RetryPlugin {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[async_trait]
impl Plugin for RetryPlugin {
    fn name(&self) -> &str {
        "retry"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> Option<&str> {
        Some("Automatic retry with exponential backoff")
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::Fetch]
    }

    async fn on_fetch(&self, ctx: &mut FetchContext<'_>) -> FetchResult<()> {
        let inner = ctx.fetch_fn().clone();
        let config = self.config.clone();

        ctx.set_fetch_fn(FetchFn::new(move |input, init| {
            let inner = inner.clone();
            let config = config.clone();
            async move {
                let max_attempts = config.max_attempts.max(1);
                let mut attempt = 1;
                loop {
                    let result = inner.call(input.clone(), init.clone()).await;
                    if attempt >= max_attempts {
                        return result;
                    }

                    let retry = match &result {
                        Ok(response) if config.retry_statuses.contains(&response.status.as_u16()) => {
                            warn!(
                                request_id = %init.id,
                                "Attempt {}/{} returned status {}, retrying",
                                attempt,
                                max_attempts,
                                response.status
                            );
                            true
                        }
                        Err(e) if e.is_retryable() => {
                            warn!(
                                request_id = %init.id,
                                "Attempt {}/{} failed: {}, retrying",
                                attempt,
                                max_attempts,
                                e
                            );
                            true
                        }
                        _ => false,
                    };
                    if !retry {
                        return result;
                    }

                    let delay = config.delay_for(attempt - 1);
                    debug!(request_id = %init.id, "Retry backoff {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }));
        Ok(())
    }
}
