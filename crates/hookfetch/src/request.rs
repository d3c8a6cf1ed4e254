//! Request state and the `onRequestInit` phase
//!
//! [`RequestInit`] is the mutable record hooks rewrite before dispatch.
//! [`RequestBuilder`] layers per-call overrides over client defaults, and
//! [`run_request_init`] drives the first pipeline phase.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use crate::client::Client;
use crate::error::{FetchError, FetchResult};
use crate::plugins::{HookRegistry, Phase, RequestInitContext};
use crate::response::Response;

/// Unique identity of one logical request
///
/// Plugins use it to correlate state across phases, e.g. a start time
/// recorded in `onRequestInit` and read back in `onResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Request body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Body contents, empty slice for [`Body::Empty`]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Bytes(bytes) => bytes,
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

/// Mutable request state passed through the `onRequestInit` hooks
///
/// Header names are case-insensitive. [`set_header`](Self::set_header)
/// replaces any existing value, so the last writer wins.
#[derive(Debug, Clone)]
pub struct RequestInit {
    /// Identity of this request
    pub id: RequestId,

    /// HTTP method
    pub method: Method,

    /// Request target
    pub url: Url,

    /// Request headers
    pub headers: HeaderMap,

    /// Request body
    pub body: Body,
}

impl RequestInit {
    /// Create a request with no headers and an empty body
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::new(),
            method,
            url,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    /// Set a header, replacing any existing values
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] if the name or value is not a
    /// valid header.
    pub fn set_header(&mut self, name: &str, value: &str) -> FetchResult<()> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a header value, keeping existing ones
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] if the name or value is not a
    /// valid header.
    pub fn append_header(&mut self, name: &str, value: &str) -> FetchResult<()> {
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// First value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Remove a header, returning whether it was present
    pub fn remove_header(&mut self, name: &str) -> bool {
        self.headers.remove(name).is_some()
    }
}

pub(crate) fn header_pair(name: &str, value: &str) -> FetchResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| FetchError::invalid_request(format!("invalid header name '{}': {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| FetchError::invalid_request(format!("invalid value for header '{}': {}", name, e)))?;
    Ok((header_name, header_value))
}

// ============================================================================
// onRequestInit PHASE
// ============================================================================

/// Result of the `onRequestInit` phase
#[derive(Debug)]
pub enum RequestInitOutcome {
    /// All hooks ran; dispatch the request
    Continue,

    /// A hook supplied the response; skip `onFetch` and the transport
    ShortCircuit(Response),
}

/// Run every `onRequestInit` hook in registration order
///
/// Stops at the first hook that calls `end_response` or fails.
///
/// ```rust
/// use hookfetch::plugins::HookRegistry;
/// use hookfetch::{Method, RequestInit, RequestInitOutcome, Url, run_request_init};
///
/// # tokio_test::block_on(async {
/// let registry = HookRegistry::new();
/// let mut init = RequestInit::new(Method::GET, Url::parse("https://example.com/").unwrap());
///
/// let outcome = run_request_init(&registry, &mut init).await.unwrap();
/// assert!(matches!(outcome, RequestInitOutcome::Continue));
/// # });
/// ```
///
/// # Errors
///
/// Returns the first hook error unchanged.
pub async fn run_request_init(
    registry: &HookRegistry,
    request_init: &mut RequestInit,
) -> FetchResult<RequestInitOutcome> {
    for plugin in registry.for_phase(Phase::RequestInit) {
        debug!(
            plugin = plugin.name(),
            request_id = %request_init.id,
            "Calling onRequestInit"
        );

        let mut ctx = RequestInitContext::new(request_init);
        if let Err(e) = plugin.on_request_init(&mut ctx).await {
            error!(
                "Plugin '{}' onRequestInit failed for {} {}: {}",
                plugin.name(),
                ctx.request_init.method,
                ctx.request_init.url,
                e
            );
            return Err(e);
        }

        if let Some(response) = ctx.into_end_response() {
            debug!(
                plugin = plugin.name(),
                request_id = %request_init.id,
                "Request short-circuited"
            );
            return Ok(RequestInitOutcome::ShortCircuit(response));
        }
    }

    Ok(RequestInitOutcome::Continue)
}

// ============================================================================
// REQUEST BUILDER
// ============================================================================

/// Fluent builder for a single request issued through a [`Client`]
///
/// Client defaults (base URL, default headers) are applied first; headers set
/// on the builder override them. Errors from builder calls are deferred until
/// [`build`](Self::build) or [`send`](Self::send).
///
/// # Examples
///
/// ```rust,no_run
/// use hookfetch::Client;
///
/// # async fn example() -> hookfetch::FetchResult<()> {
/// let client = Client::builder()
///     .with_base_url("https://api.example.com/v1".parse().unwrap())
///     .build()?;
///
/// let response = client
///     .get("/users")
///     .query("page", "2")
///     .header("accept", "application/json")
///     .send()
///     .await?;
/// println!("{}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RequestBuilder {
    client: Client,
    method: Method,
    target: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Body,
    error: Option<FetchError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, method: Method, target: String) -> Self {
        Self {
            client,
            method,
            target,
            headers: Vec::new(),
            query: Vec::new(),
            body: Body::Empty,
            error: None,
        }
    }

    /// Set a header; a later call with the same name wins
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set several headers
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the raw body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body and set `content-type`
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Body::from(bytes);
                self.headers
                    .push((CONTENT_TYPE.to_string(), "application/json".to_string()));
            }
            Err(e) => {
                self.error
                    .get_or_insert_with(|| FetchError::invalid_request(format!("JSON body: {}", e)));
            }
        }
        self
    }

    /// Set a plain-text body and `content-type`
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Body::from(text.into());
        self.headers.push((
            CONTENT_TYPE.to_string(),
            "text/plain; charset=utf-8".to_string(),
        ));
        self
    }

    /// Assemble the [`RequestInit`] without sending it
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] when the target cannot be
    /// resolved to an absolute URL, a header is invalid, or JSON encoding
    /// failed.
    pub fn build(self) -> FetchResult<RequestInit> {
        self.into_parts().map(|(_, init)| init)
    }

    /// Run the full pipeline and return the final response
    ///
    /// # Errors
    ///
    /// Returns the first unrecovered error from building, any hook, or the
    /// transport.
    pub async fn send(self) -> FetchResult<Response> {
        let (client, init) = self.into_parts()?;
        client.execute(init).await
    }

    /// Like [`send`](Self::send), aborting with [`FetchError::Cancelled`] when
    /// `token` fires
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_with_cancel(self, token: CancellationToken) -> FetchResult<Response> {
        let (client, init) = self.into_parts()?;
        client.execute_with_cancel(init, token).await
    }

    fn into_parts(self) -> FetchResult<(Client, RequestInit)> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut url = resolve_target(self.client.base_url(), &self.target)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }

        let mut init = RequestInit::new(self.method, url);
        init.headers = self.client.default_headers().clone();
        for (name, value) in &self.headers {
            init.set_header(name, value)?;
        }
        init.body = self.body;

        Ok((self.client, init))
    }
}

/// Resolve `target` against an optional base URL
///
/// Absolute targets are used as-is. Relative targets are appended to the
/// base path, so `/users` against `https://host/v1` yields
/// `https://host/v1/users`.
pub(crate) fn resolve_target(base: Option<&Url>, target: &str) -> FetchResult<Url> {
    if let Ok(url) = Url::parse(target) {
        return Ok(url);
    }

    let base = base.ok_or_else(|| {
        FetchError::invalid_request(format!("relative URL '{}' without a base URL", target))
    })?;

    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(target.trim_start_matches('/'))
        .map_err(|e| FetchError::invalid_request(format!("invalid URL '{}': {}", target, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_header_last_write_wins_case_insensitive() {
        let mut init = RequestInit::new(Method::GET, url("https://example.com"));
        init.set_header("X-Token", "first").unwrap();
        init.set_header("x-token", "second").unwrap();

        assert_eq!(init.header("X-TOKEN"), Some("second"));
        assert_eq!(init.headers.get_all("x-token").iter().count(), 1);
    }

    #[test]
    fn test_append_header_keeps_values() {
        let mut init = RequestInit::new(Method::GET, url("https://example.com"));
        init.append_header("accept", "text/html").unwrap();
        init.append_header("accept", "application/json").unwrap();
        assert_eq!(init.headers.get_all("accept").iter().count(), 2);
        assert!(init.remove_header("Accept"));
        assert!(init.header("accept").is_none());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut init = RequestInit::new(Method::GET, url("https://example.com"));
        assert!(matches!(
            init.set_header("bad header", "v"),
            Err(FetchError::InvalidRequest { .. })
        ));
        assert!(matches!(
            init.set_header("x-ok", "line\nbreak"),
            Err(FetchError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestInit::new(Method::GET, url("https://example.com"));
        let b = RequestInit::new(Method::GET, url("https://example.com"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_resolve_target() {
        let base = url("https://api.example.com/v1");
        assert_eq!(
            resolve_target(Some(&base), "/users").unwrap().as_str(),
            "https://api.example.com/v1/users"
        );
        assert_eq!(
            resolve_target(Some(&base), "users/1").unwrap().as_str(),
            "https://api.example.com/v1/users/1"
        );
        assert_eq!(
            resolve_target(Some(&base), "https://other.com/x").unwrap().as_str(),
            "https://other.com/x"
        );
        assert!(resolve_target(None, "/users").is_err());
    }

    #[test]
    fn test_body_conversions() {
        assert!(Body::default().is_empty());
        assert_eq!(Body::from("abc").as_bytes(), b"abc");
        assert_eq!(Body::from(vec![1u8, 2]).as_bytes(), &[1u8, 2]);
        assert!(Body::from(String::new()).is_empty());
    }
}
