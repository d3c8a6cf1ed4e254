//! The client and the top-level request pipeline

use hookfetch_cookies::CookieStore;
use http::{HeaderMap, Method};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, warn};
use url::Url;

use super::builder::ClientBuilder;
use super::config::ClientConfig;
use crate::error::{FetchError, FetchResult};
use crate::fetch::{FetchFn, TransportInvoker};
use crate::plugins::HookRegistry;
use crate::request::{RequestBuilder, RequestInit, RequestInitOutcome, run_request_init};
use crate::response::{Response, ResponsePostProcessor};

/// Immutable client state shared by every clone
#[derive(Debug)]
pub(super) struct ClientInner {
    pub(super) config: ClientConfig,
    pub(super) default_headers: HeaderMap,
    pub(super) registry: HookRegistry,
    pub(super) fetch_fn: FetchFn,
    pub(super) cookie_store: Option<Arc<CookieStore>>,
}

/// HTTP client running every request through its plugin pipeline
///
/// `Client` is cheaply cloneable; clones share plugins, transport and cookie
/// store. Concurrent requests run independent pipelines.
///
/// A request goes through three phases:
///
/// 1. `onRequestInit` hooks rewrite the [`RequestInit`] and may short-circuit
///    with a response.
/// 2. `onFetch` hooks decorate the fetch function, which is then called once.
///    Skipped after a short-circuit.
/// 3. `onResponse` hooks rewrite or reject the response. This phase also runs
///    for short-circuited responses.
///
/// The first error from any hook or from the fetch function is returned
/// unchanged and nothing after it runs.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub(super) fn from_inner(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    // ============================================================================
    // REQUEST ENTRY POINTS
    // ============================================================================

    /// Start a request; `target` is absolute or relative to the base URL
    pub fn request(&self, method: Method, target: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, target.into())
    }

    pub fn get(&self, target: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, target)
    }

    pub fn post(&self, target: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, target)
    }

    pub fn put(&self, target: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, target)
    }

    pub fn patch(&self, target: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, target)
    }

    pub fn delete(&self, target: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, target)
    }

    pub fn head(&self, target: impl Into<String>) -> RequestBuilder {
        self.request(Method::HEAD, target)
    }

    /// Run the full pipeline for an assembled request
    ///
    /// # Errors
    ///
    /// Returns the first unrecovered error from a hook or the fetch function.
    pub async fn execute(&self, request_init: RequestInit) -> FetchResult<Response> {
        let span = debug_span!(
            "hookfetch.request",
            request_id = %request_init.id,
            method = %request_init.method,
            url = %request_init.url,
        );
        self.run_pipeline(request_init).instrument(span).await
    }

    /// Like [`execute`](Self::execute), returning [`FetchError::Cancelled`] as
    /// soon as `token` fires
    ///
    /// The in-flight pipeline future, including any transport call, is
    /// dropped on cancellation. Hooks that already ran are not undone.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_with_cancel(
        &self,
        request_init: RequestInit,
        token: CancellationToken,
    ) -> FetchResult<Response> {
        let id = request_init.id;
        tokio::select! {
            biased;
            () = token.cancelled() => {
                warn!(request_id = %id, "Request cancelled");
                Err(FetchError::Cancelled)
            }
            result = self.execute(request_init) => result,
        }
    }

    async fn run_pipeline(&self, mut request_init: RequestInit) -> FetchResult<Response> {
        let inner = &self.inner;
        let outcome = run_request_init(&inner.registry, &mut request_init).await?;

        // Frozen from here on
        let request_init = Arc::new(request_init);

        let mut response = match outcome {
            RequestInitOutcome::ShortCircuit(response) => response,
            RequestInitOutcome::Continue => {
                TransportInvoker::new(&inner.registry, &inner.fetch_fn)
                    .invoke(request_init.clone())
                    .await?
            }
        };
        response.attach_request(request_init.clone());

        ResponsePostProcessor::new(&inner.registry)
            .run(&mut response, &request_init)
            .await?;

        debug!(status = response.status.as_u16(), "Request completed");
        Ok(response)
    }

    // ============================================================================
    // ACCESSORS
    // ============================================================================

    pub fn registry(&self) -> &HookRegistry {
        &self.inner.registry
    }

    /// Cookie store installed with [`ClientBuilder::with_cookie_store`]
    pub fn cookie_store(&self) -> Option<&Arc<CookieStore>> {
        self.inner.cookie_store.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.inner.config.base_url.as_ref()
    }

    /// Headers applied to every request before per-call overrides
    pub fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }
}
