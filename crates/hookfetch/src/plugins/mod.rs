//! Plugin system
//!
//! A plugin is a named bundle of optional hooks for three phases, run in
//! registration order:
//!
//! ```text
//! onRequestInit:  P1 → P2 → … → Pn      (may end early with a response)
//! onFetch:        F0 ← wrapped by P1 ← wrapped by P2 …   (called once)
//! onResponse:     P1 → P2 → … → Pn      (may raise to abort)
//! ```
//!
//! ## Core Components
//!
//! - **Plugin**: trait declaring a plugin's phases and hooks
//! - **HookRegistry**: ordered plugin list with per-phase iteration
//! - **RequestInitContext / FetchContext / ResponseContext**: what each hook receives
//! - **Built-in plugins**: cookies, retry, cache, timeout, metrics, default headers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hookfetch::plugins::{CacheConfig, CachePlugin, RetryConfig, RetryPlugin};
//! use hookfetch::Client;
//! use std::sync::Arc;
//!
//! # fn example() -> hookfetch::FetchResult<()> {
//! // Retry wraps the transport, cache wraps retry: hits skip both
//! let client = Client::builder()
//!     .with_plugin(Arc::new(RetryPlugin::new(RetryConfig::default())))
//!     .with_plugin(Arc::new(CachePlugin::new(CacheConfig::default())))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cookies;
pub mod core;
pub mod headers;
pub mod metrics;
pub mod registry;
pub mod retry;
pub mod timeout;

pub use self::core::{FetchContext, Phase, Plugin, RequestInitContext, ResponseContext};

pub use registry::{HookRegistry, PhaseHooks};

pub use cache::{CacheConfig, CachePlugin, CacheStats};
pub use cookies::CookiePlugin;
pub use headers::DefaultHeadersPlugin;
pub use metrics::{MethodMetrics, MetricsData, MetricsPlugin};
pub use retry::{RetryConfig, RetryPlugin};
pub use timeout::{TimeoutConfig, TimeoutPlugin};
