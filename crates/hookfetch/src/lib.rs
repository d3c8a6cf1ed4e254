//! # hookfetch
//!
//! An HTTP client whose every request runs through an ordered pipeline of
//! plugin hooks.
//!
//! ## Pipeline
//!
//! - **onRequestInit**: plugins rewrite the outgoing [`RequestInit`] in
//!   registration order. Any of them may end the request early with a
//!   response of its own, skipping the transport.
//! - **onFetch**: plugins decorate the [`FetchFn`], each wrapping the one
//!   bound before it (retry, cache, timeout). The final binding is called
//!   exactly once.
//! - **onResponse**: plugins rewrite the [`Response`] or reject it by
//!   returning an error. Short-circuited responses pass through here too.
//!
//! The first error from any hook or from the transport reaches the caller
//! unchanged.
//!
//! ## Cookies
//!
//! A [`CookieStore`](cookies::CookieStore) shared through
//! [`ClientBuilder::with_cookie_store`] is read into `Cookie` headers and
//! updated from `Set-Cookie` headers by every request of the client.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use hookfetch::plugins::{Phase, Plugin, ResponseContext};
//! use hookfetch::{Client, FetchError, FetchResult, StatusCode};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct RejectUnauthorized;
//!
//! #[async_trait]
//! impl Plugin for RejectUnauthorized {
//!     fn name(&self) -> &str {
//!         "reject-401"
//!     }
//!
//!     fn version(&self) -> &str {
//!         "1.0.0"
//!     }
//!
//!     fn phases(&self) -> &[Phase] {
//!         &[Phase::Response]
//!     }
//!
//!     async fn on_response(&self, ctx: &mut ResponseContext<'_>) -> FetchResult<()> {
//!         if ctx.response.status == StatusCode::UNAUTHORIZED {
//!             return Err(FetchError::response_abort(401, "login required"));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> FetchResult<()> {
//! let client = Client::builder()
//!     .with_base_url("https://api.example.com".parse().unwrap())
//!     .with_plugin(Arc::new(RejectUnauthorized))
//!     .build()?;
//!
//! let response = client.get("/me").send().await?;
//! println!("{}", response.text()?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod fetch;
pub mod plugins;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{Client, ClientBuilder, ClientConfig};
pub use error::{FetchError, FetchResult};
pub use fetch::{FetchFn, Transport, TransportInvoker};
pub use request::{Body, RequestBuilder, RequestId, RequestInit, RequestInitOutcome, run_request_init};
pub use response::{Response, ResponsePostProcessor};

#[cfg(feature = "reqwest")]
pub use transport::{ReqwestTransport, ReqwestTransportConfig};

pub use hookfetch_cookies as cookies;
pub use http::{HeaderMap, Method, StatusCode, header};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;
