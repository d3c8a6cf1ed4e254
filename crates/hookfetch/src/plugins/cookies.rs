//! Cookie plugin backed by a shared [`CookieStore`]

use async_trait::async_trait;
use http::header::{COOKIE, HeaderValue};
use hookfetch_cookies::{CookieRecord, CookieStore, parse_set_cookie};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::plugins::core::{Phase, Plugin, RequestInitContext, ResponseContext};

/// Injects `Cookie` headers from a store and captures `Set-Cookie` headers into it
///
/// Every client request sharing the store sees the same cookie state. A
/// `Cookie` header already present on the request is kept and the store's
/// cookies are appended to it.
///
/// A `Set-Cookie` without a `Domain` attribute is stored host-only for the
/// responding host, unless it names an unscoped cookie already in the store
/// (such as one from [`CookieStore::new`]), which it then updates or deletes.
#[derive(Debug, Clone)]
pub struct CookiePlugin {
    store: Arc<CookieStore>,
}

impl CookiePlugin {
    #[must_use]
    pub fn new(store: Arc<CookieStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CookieStore> {
        &self.store
    }

    fn updates_unscoped(&self, record: &CookieRecord) -> bool {
        self.store
            .get_all_named(&record.name)
            .iter()
            .any(|stored| stored.domain.is_none() && stored.path == record.path)
    }
}

#[async_trait]
impl Plugin for CookiePlugin {
    fn name(&self) -> &str {
        "cookies"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> Option<&str> {
        Some("Sends stored cookies and records cookies set by responses")
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::RequestInit, Phase::Response]
    }

    async fn on_request_init(&self, ctx: &mut RequestInitContext<'_>) -> FetchResult<()> {
        let url = &ctx.request_init.url;
        let host = url.host_str().unwrap_or_default();
        let secure = url.scheme() == "https";

        let Some(stored) = self.store.cookie_header_for(host, url.path(), secure) else {
            return Ok(());
        };

        let header = match ctx.request_init.header(COOKIE.as_str()) {
            Some(existing) if !existing.trim().is_empty() => format!("{}; {}", existing, stored),
            _ => stored,
        };

        let value = HeaderValue::from_str(&header)
            .map_err(|e| FetchError::hook(self.name(), Phase::RequestInit, e.to_string()))?;
        ctx.request_init.headers.insert(COOKIE, value);

        debug!(request_id = %ctx.request_init.id, "Attached stored cookies");
        Ok(())
    }

    async fn on_response(&self, ctx: &mut ResponseContext<'_>) -> FetchResult<()> {
        let host = ctx.request_init.url.host_str().unwrap_or_default();

        for header in ctx.response.set_cookie_headers() {
            let mut record = match parse_set_cookie(header) {
                Ok(record) => record,
                Err(e) => {
                    warn!(request_id = %ctx.request_init.id, "Ignoring Set-Cookie: {}", e);
                    continue;
                }
            };

            if !record.accepts_host(host) {
                warn!(
                    request_id = %ctx.request_init.id,
                    "Ignoring Set-Cookie for '{}' from foreign host {}",
                    record.name,
                    host
                );
                continue;
            }

            if record.domain.is_none() && !host.is_empty() && !self.updates_unscoped(&record) {
                record = record.with_host_only(host);
            }

            if let Err(e) = self.store.set_with(record) {
                warn!(request_id = %ctx.request_init.id, "Rejected Set-Cookie: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestInit;
    use crate::response::Response;
    use http::header::SET_COOKIE;
    use http::{Method, StatusCode};
    use url::Url;

    fn request(url: &str) -> RequestInit {
        RequestInit::new(Method::GET, Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_injects_and_merges_cookie_header() {
        let store = Arc::new(CookieStore::new("session=abc"));
        let plugin = CookiePlugin::new(store);

        let mut init = request("https://example.com/");
        init.set_header("cookie", "theme=dark").unwrap();
        let mut ctx = RequestInitContext::new(&mut init);
        plugin.on_request_init(&mut ctx).await.unwrap();

        assert_eq!(init.header("cookie"), Some("theme=dark; session=abc"));
    }

    #[tokio::test]
    async fn test_empty_store_leaves_request_untouched() {
        let plugin = CookiePlugin::new(Arc::new(CookieStore::default()));
        let mut init = request("https://example.com/");
        let mut ctx = RequestInitContext::new(&mut init);
        plugin.on_request_init(&mut ctx).await.unwrap();
        assert!(init.header("cookie").is_none());
    }

    #[tokio::test]
    async fn test_captures_set_cookie_headers() {
        let store = Arc::new(CookieStore::new("stale=1"));
        let plugin = CookiePlugin::new(store.clone());

        let init = request("https://api.example.com/login");
        let mut response = Response::new(StatusCode::OK)
            .with_header(SET_COOKIE, HeaderValue::from_static("token=xyz; Path=/; HttpOnly"))
            .with_header(SET_COOKIE, HeaderValue::from_static("stale=; Max-Age=0"))
            .with_header(SET_COOKIE, HeaderValue::from_static("=broken"))
            .with_header(
                SET_COOKIE,
                HeaderValue::from_static("tracker=1; Domain=other.org"),
            );

        let mut ctx = ResponseContext::new(&mut response, &init);
        plugin.on_response(&mut ctx).await.unwrap();

        let token = store.get("token").unwrap();
        assert_eq!(token.value, "xyz");
        assert!(token.http_only);
        assert!(token.host_only);
        assert_eq!(token.domain.as_deref(), Some("api.example.com"));
        assert!(store.get("stale").is_none());
        assert!(store.get("tracker").is_none());
    }
}
