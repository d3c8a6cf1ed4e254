//! Client builder
//!
//! Plugins are installed in the order the builder methods are called; that
//! order is the execution order of every phase.

use hookfetch_cookies::CookieStore;
use http::HeaderMap;
use http::header::USER_AGENT;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::config::ClientConfig;
use super::core::{Client, ClientInner};
use crate::error::{FetchError, FetchResult};
use crate::fetch::{FetchFn, Transport};
use crate::plugins::{CookiePlugin, HookRegistry, Plugin};
use crate::request::header_pair;

/// Builder for configuring and creating clients
///
/// # Examples
///
/// ```rust,no_run
/// use hookfetch::Client;
/// use hookfetch::cookies::CookieStore;
/// use hookfetch::plugins::{RetryConfig, RetryPlugin, TimeoutConfig, TimeoutPlugin};
/// use std::sync::Arc;
///
/// # fn example() -> hookfetch::FetchResult<()> {
/// let cookies = Arc::new(CookieStore::new(""));
///
/// let client = Client::builder()
///     .with_base_url("https://api.example.com".parse().unwrap())
///     .with_user_agent("hookfetch-example/1.0")
///     .with_cookie_store(cookies.clone())
///     .with_plugin(Arc::new(TimeoutPlugin::new(TimeoutConfig { timeout_ms: 5_000 })))
///     .with_plugin(Arc::new(RetryPlugin::new(RetryConfig::default())))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    plugins: Vec<Arc<dyn Plugin>>,
    cookie_store: Option<Arc<CookieStore>>,
    fetch_fn: Option<FetchFn>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================================
    // REQUEST DEFAULTS
    // ============================================================================

    /// Replace the whole configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.config.base_url = Some(base_url);
        self
    }

    /// Add a header sent on every request
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .push((name.into(), value.into()));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    // ============================================================================
    // PLUGINS
    // ============================================================================

    /// Append a plugin
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Append several plugins in order
    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Share `store` with this client and install a [`CookiePlugin`] at this
    /// position of the plugin list
    pub fn with_cookie_store(mut self, store: Arc<CookieStore>) -> Self {
        self.plugins.push(Arc::new(CookiePlugin::new(store.clone())));
        self.cookie_store = Some(store);
        self
    }

    // ============================================================================
    // TRANSPORT
    // ============================================================================

    /// Use `transport` as the base fetch function
    pub fn with_transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.fetch_fn = Some(FetchFn::from_transport(Arc::new(transport)));
        self
    }

    /// Use an arbitrary function as the base fetch function
    pub fn with_fetch_fn(mut self, fetch_fn: FetchFn) -> Self {
        self.fetch_fn = Some(fetch_fn);
        self
    }

    /// Build the client
    ///
    /// Without an explicit transport the reqwest transport is used.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if a default header or the
    /// user agent is invalid, or no transport is available.
    pub fn build(self) -> FetchResult<Client> {
        let default_headers = default_headers(&self.config)?;

        let fetch_fn = match self.fetch_fn {
            Some(fetch_fn) => fetch_fn,
            None => default_fetch_fn()?,
        };

        let mut registry = HookRegistry::new();
        for plugin in self.plugins {
            registry.register(plugin);
        }
        debug!("Client built with {} plugins", registry.plugin_count());

        Ok(Client::from_inner(ClientInner {
            config: self.config,
            default_headers,
            registry,
            fetch_fn,
            cookie_store: self.cookie_store,
        }))
    }
}

fn default_headers(config: &ClientConfig) -> FetchResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(user_agent) = &config.user_agent {
        let (_, value) = header_pair(USER_AGENT.as_str(), user_agent)
            .map_err(|e| FetchError::configuration(e.to_string()))?;
        headers.insert(USER_AGENT, value);
    }
    for (name, value) in &config.default_headers {
        let (name, value) =
            header_pair(name, value).map_err(|e| FetchError::configuration(e.to_string()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(feature = "reqwest")]
fn default_fetch_fn() -> FetchResult<FetchFn> {
    use crate::transport::{ReqwestTransport, ReqwestTransportConfig};

    let transport = ReqwestTransport::new(&ReqwestTransportConfig::default())?;
    Ok(FetchFn::from_transport(Arc::new(transport)))
}

#[cfg(not(feature = "reqwest"))]
fn default_fetch_fn() -> FetchResult<FetchFn> {
    Err(FetchError::configuration(
        "no transport configured and the reqwest feature is disabled",
    ))
}
