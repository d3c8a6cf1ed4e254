//! Core plugin traits and hook contexts
//!
//! Defines the [`Plugin`] trait, the [`Phase`] enum naming the three pipeline
//! stages, and the context objects each hook receives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::error::FetchResult;
use crate::fetch::FetchFn;
use crate::request::RequestInit;
use crate::response::Response;

// ============================================================================
// PHASES
// ============================================================================

/// Pipeline stage a hook belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Request assembly; hooks may rewrite the request or short-circuit it
    RequestInit,

    /// Transport binding; hooks may decorate the fetch function
    Fetch,

    /// Response post-processing; hooks may rewrite or reject the response
    Response,
}

impl Phase {
    /// Hook name as exposed to plugin authors
    pub fn hook_name(self) -> &'static str {
        match self {
            Phase::RequestInit => "onRequestInit",
            Phase::Fetch => "onFetch",
            Phase::Response => "onResponse",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hook_name())
    }
}

// ============================================================================
// CONTEXT TYPES
// ============================================================================

/// Context for the `onRequestInit` phase
///
/// `request_init` is the in-flight request: mutations are seen by every later
/// hook and by the transport. Calling [`end_response`](Self::end_response)
/// short-circuits the exchange: no further `onRequestInit` hooks run, and
/// `onFetch` and the transport are skipped.
pub struct RequestInitContext<'a> {
    /// The request being assembled
    pub request_init: &'a mut RequestInit,

    end: Option<Response>,
}

impl<'a> RequestInitContext<'a> {
    pub(crate) fn new(request_init: &'a mut RequestInit) -> Self {
        Self {
            request_init,
            end: None,
        }
    }

    /// Supply the pipeline's response without calling the transport
    ///
    /// Only the first call in a hook takes effect.
    pub fn end_response(&mut self, response: Response) {
        if self.end.is_some() {
            warn!(
                request_id = %self.request_init.id,
                "end_response called more than once; keeping the first response"
            );
            return;
        }
        self.end = Some(response);
    }

    /// Whether `end_response` has been called
    pub fn is_ended(&self) -> bool {
        self.end.is_some()
    }

    pub(crate) fn into_end_response(self) -> Option<Response> {
        self.end
    }
}

/// Context for the `onFetch` phase
///
/// Holds the current fetch function. A hook decorates it by cloning
/// [`fetch_fn`](Self::fetch_fn), wrapping the clone, and installing the wrapper
/// with [`set_fetch_fn`](Self::set_fetch_fn). The request is frozen here.
pub struct FetchContext<'a> {
    /// The finalized request
    pub request_init: &'a RequestInit,

    fetch_fn: FetchFn,
}

impl<'a> FetchContext<'a> {
    pub(crate) fn new(request_init: &'a RequestInit, fetch_fn: FetchFn) -> Self {
        Self {
            request_init,
            fetch_fn,
        }
    }

    /// The fetch function bound so far
    pub fn fetch_fn(&self) -> &FetchFn {
        &self.fetch_fn
    }

    /// Replace the bound fetch function
    pub fn set_fetch_fn(&mut self, fetch_fn: FetchFn) {
        self.fetch_fn = fetch_fn;
    }

    pub(crate) fn into_fetch_fn(self) -> FetchFn {
        self.fetch_fn
    }
}

/// Context for the `onResponse` phase
pub struct ResponseContext<'a> {
    /// The response, mutable by hooks
    pub response: &'a mut Response,

    /// The request that produced it
    pub request_init: &'a RequestInit,
}

impl<'a> ResponseContext<'a> {
    pub(crate) fn new(response: &'a mut Response, request_init: &'a RequestInit) -> Self {
        Self {
            response,
            request_init,
        }
    }
}

// ============================================================================
// PLUGIN TRAIT
// ============================================================================

/// A named bundle of optional lifecycle hooks
///
/// Plugins are installed into a client in order and that order is the
/// execution order of every phase. A hook runs only if the plugin lists its
/// phase in [`phases`](Self::phases); the default hook bodies do nothing.
///
/// Any hook may fail. The first failure aborts the whole request and reaches
/// the caller unchanged.
///
/// # Examples
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use hookfetch::plugins::{Phase, Plugin, RequestInitContext};
/// use hookfetch::FetchResult;
///
/// #[derive(Debug)]
/// struct TracePlugin;
///
/// #[async_trait]
/// impl Plugin for TracePlugin {
///     fn name(&self) -> &str {
///         "trace"
///     }
///
///     fn version(&self) -> &str {
///         "1.0.0"
///     }
///
///     fn phases(&self) -> &[Phase] {
///         &[Phase::RequestInit]
///     }
///
///     async fn on_request_init(&self, ctx: &mut RequestInitContext<'_>) -> FetchResult<()> {
///         let id = ctx.request_init.id.to_string();
///         ctx.request_init.set_header("x-request-id", &id)
///     }
/// }
/// ```
#[async_trait]
pub trait Plugin: Send + Sync + fmt::Debug {
    /// Plugin name, used in logs and lookups
    fn name(&self) -> &str;

    /// Plugin version
    fn version(&self) -> &str;

    /// Optional plugin description
    fn description(&self) -> Option<&str> {
        None
    }

    /// Phases this plugin has hooks for
    fn phases(&self) -> &[Phase];

    /// Hook called while the request is being assembled
    async fn on_request_init(&self, _ctx: &mut RequestInitContext<'_>) -> FetchResult<()> {
        Ok(())
    }

    /// Hook called to bind the fetch function
    async fn on_fetch(&self, _ctx: &mut FetchContext<'_>) -> FetchResult<()> {
        Ok(())
    }

    /// Hook called with the response before it is returned
    async fn on_response(&self, _ctx: &mut ResponseContext<'_>) -> FetchResult<()> {
        Ok(())
    }

    /// Whether the plugin has a hook for `phase`
    fn handles(&self, phase: Phase) -> bool {
        self.phases().contains(&phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use url::Url;

    fn request() -> RequestInit {
        RequestInit::new(Method::GET, Url::parse("https://example.com/").unwrap())
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::RequestInit.to_string(), "onRequestInit");
        assert_eq!(Phase::Fetch.to_string(), "onFetch");
        assert_eq!(Phase::Response.to_string(), "onResponse");
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&Phase::RequestInit).unwrap();
        assert_eq!(json, "\"requestInit\"");
    }

    #[test]
    fn test_end_response_keeps_first() {
        let mut init = request();
        let mut ctx = RequestInitContext::new(&mut init);
        assert!(!ctx.is_ended());

        ctx.end_response(Response::new(StatusCode::OK));
        ctx.end_response(Response::new(StatusCode::NOT_FOUND));
        assert!(ctx.is_ended());

        let response = ctx.into_end_response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[test]
    fn test_request_init_context_mutation() {
        let mut init = request();
        {
            let mut ctx = RequestInitContext::new(&mut init);
            ctx.request_init.set_header("x-test", "1").unwrap();
        }
        assert_eq!(init.header("x-test"), Some("1"));
    }
}
