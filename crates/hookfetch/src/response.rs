//! Response type and the `onResponse` phase

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, SET_COOKIE};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::plugins::{HookRegistry, Phase, ResponseContext};
use crate::request::RequestInit;

/// A fully buffered HTTP response
///
/// Every response returned by the pipeline, whether it came from the
/// transport or from a short-circuiting hook, carries a back-reference to
/// the [`RequestInit`] that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code
    pub status: StatusCode,

    /// Response headers
    pub headers: HeaderMap,

    /// Response body
    pub body: Bytes,

    /// Final URL, after any redirects the transport followed
    pub url: Option<Url>,

    origin: Option<Arc<RequestInit>>,
}

impl Response {
    /// Create an empty response with the given status
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            url: None,
            origin: None,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// First value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every `Set-Cookie` header value, in order
    pub fn set_cookie_headers(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Body as UTF-8 text
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Decode`] if the body is not valid UTF-8.
    pub fn text(&self) -> FetchResult<&str> {
        std::str::from_utf8(&self.body).map_err(|e| FetchError::decode(e.to_string()))
    }

    /// Deserialize the body as JSON
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> FetchResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| FetchError::decode(e.to_string()))
    }

    /// The request that produced this response
    pub fn request_init(&self) -> Option<&RequestInit> {
        self.origin.as_deref()
    }

    pub(crate) fn attach_request(&mut self, request_init: Arc<RequestInit>) {
        if self.url.is_none() {
            self.url = Some(request_init.url.clone());
        }
        self.origin = Some(request_init);
    }
}

/// Runs the `onResponse` phase over a response
#[derive(Debug)]
pub struct ResponsePostProcessor<'a> {
    registry: &'a HookRegistry,
}

impl<'a> ResponsePostProcessor<'a> {
    pub fn new(registry: &'a HookRegistry) -> Self {
        Self { registry }
    }

    /// Run every `onResponse` hook in registration order
    ///
    /// # Errors
    ///
    /// Returns the first hook error unchanged; later hooks do not run.
    pub async fn run(&self, response: &mut Response, request_init: &RequestInit) -> FetchResult<()> {
        for plugin in self.registry.for_phase(Phase::Response) {
            debug!(
                plugin = plugin.name(),
                request_id = %request_init.id,
                status = response.status.as_u16(),
                "Calling onResponse"
            );

            let mut ctx = ResponseContext::new(response, request_init);
            plugin.on_response(&mut ctx).await.map_err(|e| {
                error!(
                    "Plugin '{}' onResponse failed for {} {}: {}",
                    plugin.name(),
                    request_init.method,
                    request_init.url,
                    e
                );
                e
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::Plugin;
    use async_trait::async_trait;
    use http::Method;
    use parking_lot::Mutex;
    use serde::Deserialize;

    fn request() -> RequestInit {
        RequestInit::new(Method::GET, Url::parse("https://example.com/a").unwrap())
    }

    #[derive(Debug)]
    struct Rewriter {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Plugin for Rewriter {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn phases(&self) -> &[Phase] {
            &[Phase::Response]
        }

        async fn on_response(&self, ctx: &mut ResponseContext<'_>) -> FetchResult<()> {
            let previous = ctx.response.header("x-last").unwrap_or("none").to_string();
            self.seen.lock().push(format!("{}:{}", self.name, previous));
            if self.fail {
                return Err(FetchError::response_abort(
                    ctx.response.status.as_u16(),
                    "rejected",
                ));
            }
            ctx.response
                .headers
                .insert("x-last", HeaderValue::from_static(self.name));
            Ok(())
        }
    }

    #[test]
    fn test_body_helpers() {
        #[derive(Deserialize)]
        struct Item {
            id: u32,
        }

        let response = Response::new(StatusCode::OK).with_body(r#"{"id": 7}"#);
        assert_eq!(response.text().unwrap(), r#"{"id": 7}"#);
        assert_eq!(response.json::<Item>().unwrap().id, 7);

        let broken = Response::new(StatusCode::OK).with_body(vec![0xff, 0xfe]);
        assert!(matches!(broken.text(), Err(FetchError::Decode { .. })));
        assert!(matches!(broken.json::<Item>(), Err(FetchError::Decode { .. })));
    }

    #[test]
    fn test_set_cookie_headers_in_order() {
        let response = Response::new(StatusCode::OK)
            .with_header(SET_COOKIE, HeaderValue::from_static("a=1"))
            .with_header(SET_COOKIE, HeaderValue::from_static("b=2; Path=/"));
        let values: Vec<_> = response.set_cookie_headers().collect();
        assert_eq!(values, vec!["a=1", "b=2; Path=/"]);
    }

    #[test]
    fn test_attach_request_back_reference() {
        let init = Arc::new(request());
        let mut response = Response::new(StatusCode::OK);
        assert!(response.request_init().is_none());

        response.attach_request(init.clone());
        assert_eq!(response.request_init().unwrap().id, init.id);
        assert_eq!(response.url.as_ref().unwrap().path(), "/a");
    }

    #[tokio::test]
    async fn test_mutations_visible_to_later_hooks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        for name in ["first", "second"] {
            registry.register(Arc::new(Rewriter {
                name,
                seen: seen.clone(),
                fail: false,
            }));
        }

        let init = request();
        let mut response = Response::new(StatusCode::OK);
        ResponsePostProcessor::new(&registry)
            .run(&mut response, &init)
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec!["first:none", "second:first"]);
        assert_eq!(response.header("x-last"), Some("second"));
    }

    #[tokio::test]
    async fn test_first_error_stops_phase() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(Rewriter {
            name: "gate",
            seen: seen.clone(),
            fail: true,
        }));
        registry.register(Arc::new(Rewriter {
            name: "after",
            seen: seen.clone(),
            fail: false,
        }));

        let init = request();
        let mut response = Response::new(StatusCode::UNAUTHORIZED);
        let error = ResponsePostProcessor::new(&registry)
            .run(&mut response, &init)
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::ResponseAbort { status: 401, .. }));
        assert_eq!(*seen.lock(), vec!["gate:none"]);
    }
}
