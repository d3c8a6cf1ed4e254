use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::fetch::Transport;
use crate::request::{Body, RequestInit};
use crate::response::Response;

/// Connection settings for [`ReqwestTransport`]
///
/// No overall request timeout is applied; install a
/// [`TimeoutPlugin`](crate::plugins::TimeoutPlugin) for that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReqwestTransportConfig {
    /// TCP/TLS connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// How long idle pooled connections are kept, in milliseconds
    pub pool_idle_timeout_ms: Option<u64>,
}

/// [`Transport`] backed by a `reqwest::Client`
///
/// Redirects are followed by reqwest; the final URL is reported in
/// [`Response::url`]. Dropping the request future aborts the connection.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ::reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with its own connection pool
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if reqwest cannot build the
    /// client (e.g. the TLS backend fails to initialize).
    pub fn new(config: &ReqwestTransportConfig) -> FetchResult<Self> {
        let mut builder = ::reqwest::Client::builder();
        if let Some(ms) = config.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = config.pool_idle_timeout_ms {
            builder = builder.pool_idle_timeout(Duration::from_millis(ms));
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::configuration(format!("reqwest client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client, sharing its pool
    pub fn from_client(client: ::reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, input: Url, init: Arc<RequestInit>) -> FetchResult<Response> {
        trace!(request_id = %init.id, "reqwest {} {}", init.method, input);

        let mut request = self
            .client
            .request(init.method.clone(), input)
            .headers(init.headers.clone());
        if let Body::Bytes(bytes) = &init.body {
            request = request.body(bytes.clone());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        debug!(
            request_id = %init.id,
            status = status.as_u16(),
            bytes = body.len(),
            "Transport response received"
        );

        let mut response = Response::new(status).with_body(body);
        response.headers = headers;
        response.url = Some(url);
        Ok(response)
    }
}

fn map_reqwest_error(error: ::reqwest::Error) -> FetchError {
    if error.is_timeout() || error.is_connect() {
        FetchError::transport(error.to_string())
    } else if error.is_builder() {
        FetchError::invalid_request(error.to_string())
    } else if error.is_body() || error.is_decode() {
        FetchError::transport(error.to_string())
    } else {
        FetchError::transport_fatal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_serde() {
        let config: ReqwestTransportConfig =
            serde_json::from_str(r#"{"connect_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.connect_timeout_ms, Some(250));
        assert_eq!(config.pool_idle_timeout_ms, None);
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
