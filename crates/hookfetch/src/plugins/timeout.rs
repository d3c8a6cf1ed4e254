//! Per-attempt timeout layered over the fetch function

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::{FetchError, FetchResult};
use crate::fetch::FetchFn;
use crate::plugins::core::{FetchContext, Phase, Plugin};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for the wrapped fetch function, in milliseconds
    pub timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Fails the wrapped call with [`FetchError::Timeout`] when it takes too long
///
/// Registered before a retry plugin, each attempt gets its own budget;
/// registered after it, the budget covers all attempts.
#[derive(Debug, Clone)]
pub struct TimeoutPlugin {
    timeout: Duration,
}

impl TimeoutPlugin {
    #[must_use]
    pub fn new(config: TimeoutConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Plugin for TimeoutPlugin {
    fn name(&self) -> &str {
        "timeout"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::Fetch]
    }

    async fn on_fetch(&self, ctx: &mut FetchContext<'_>) -> FetchResult<()> {
        let inner = ctx.fetch_fn().clone();
        let after = self.timeout;

        ctx.set_fetch_fn(FetchFn::new(move |input, init| {
            let call = inner.call(input, init.clone());
            async move {
                match tokio::time::timeout(after, call).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(request_id = %init.id, "Fetch timed out after {:?}", after);
                        Err(FetchError::Timeout { after })
                    }
                }
            }
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestInit;
    use crate::response::Response;
    use http::{Method, StatusCode};
    use std::sync::Arc;
    use url::Url;

    async fn bound(plugin: &TimeoutPlugin, base: FetchFn) -> FetchFn {
        let init = RequestInit::new(Method::GET, Url::parse("https://example.com/").unwrap());
        let mut ctx = FetchContext::new(&init, base);
        plugin.on_fetch(&mut ctx).await.unwrap();
        ctx.into_fetch_fn()
    }

    fn init() -> Arc<RequestInit> {
        Arc::new(RequestInit::new(
            Method::GET,
            Url::parse("https://example.com/").unwrap(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let plugin = TimeoutPlugin::new(TimeoutConfig { timeout_ms: 50 });
        let slow = FetchFn::new(|_input, _init| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Response::new(StatusCode::OK))
        });

        let fetch_fn = bound(&plugin, slow).await;
        let init = init();
        let error = fetch_fn.call(init.url.clone(), init).await.unwrap_err();
        assert!(matches!(error, FetchError::Timeout { after } if after == Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_call_passes_through() {
        let plugin = TimeoutPlugin::new(TimeoutConfig::default());
        let fast = FetchFn::new(|_input, _init| async { Ok(Response::new(StatusCode::NO_CONTENT)) });

        let fetch_fn = bound(&plugin, fast).await;
        let init = init();
        let response = fetch_fn.call(init.url.clone(), init).await.unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }
}
