//! Fixed request headers

use async_trait::async_trait;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};

use crate::error::FetchResult;
use crate::plugins::core::{Phase, Plugin, RequestInitContext};
use crate::request::header_pair;

/// Sets a fixed set of headers on every request, replacing existing values
#[derive(Debug, Clone, Default)]
pub struct DefaultHeadersPlugin {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl DefaultHeadersPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`](crate::FetchError::InvalidRequest)
    /// for an invalid name or value.
    pub fn with_header(mut self, name: &str, value: &str) -> FetchResult<Self> {
        self.headers.push(header_pair(name, value)?);
        Ok(self)
    }

    /// `Authorization: Bearer <token>`
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`](crate::FetchError::InvalidRequest)
    /// when the token is not a valid header value.
    pub fn bearer(token: &str) -> FetchResult<Self> {
        Self::new().with_header(AUTHORIZATION.as_str(), &format!("Bearer {}", token))
    }
}

#[async_trait]
impl Plugin for DefaultHeadersPlugin {
    fn name(&self) -> &str {
        "default-headers"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::RequestInit]
    }

    async fn on_request_init(&self, ctx: &mut RequestInitContext<'_>) -> FetchResult<()> {
        for (name, value) in &self.headers {
            ctx.request_init.headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}
