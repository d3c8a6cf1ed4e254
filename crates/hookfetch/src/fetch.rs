//! Fetch function binding and the `onFetch` phase
//!
//! A [`FetchFn`] is the single capability slot that performs I/O. The
//! [`TransportInvoker`] starts from the client's base function, lets each
//! `onFetch` hook rebind it (usually to a wrapper closing over the previous
//! binding), then calls the final binding exactly once.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};
use url::Url;

use crate::error::FetchResult;
use crate::plugins::{FetchContext, HookRegistry, Phase};
use crate::request::RequestInit;
use crate::response::Response;

/// Something that can send a request and produce a response
///
/// This is the only I/O boundary of the pipeline.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send `init` to `input`
    async fn fetch(&self, input: Url, init: Arc<RequestInit>) -> FetchResult<Response>;
}

type DynFetch = dyn Fn(Url, Arc<RequestInit>) -> BoxFuture<'static, FetchResult<Response>> + Send + Sync;

/// Cloneable handle to an asynchronous `(input, init) -> Response` function
///
/// # Examples
///
/// Wrapping the current binding from an `onFetch` hook:
///
/// ```rust,no_run
/// use hookfetch::FetchFn;
///
/// fn logged(inner: FetchFn) -> FetchFn {
///     FetchFn::new(move |input, init| {
///         let inner = inner.clone();
///         async move {
///             println!("-> {} {}", init.method, input);
///             let response = inner.call(input, init).await?;
///             println!("<- {}", response.status);
///             Ok(response)
///         }
///     })
/// }
/// ```
#[derive(Clone)]
pub struct FetchFn {
    inner: Arc<DynFetch>,
}

impl FetchFn {
    /// Wrap an async closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Url, Arc<RequestInit>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<Response>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |input, init| f(input, init).boxed()),
        }
    }

    /// Bind a [`Transport`]
    pub fn from_transport(transport: Arc<dyn Transport>) -> Self {
        Self::new(move |input, init| {
            let transport = transport.clone();
            async move { transport.fetch(input, init).await }
        })
    }

    /// Invoke the function
    pub fn call(&self, input: Url, init: Arc<RequestInit>) -> BoxFuture<'static, FetchResult<Response>> {
        (self.inner)(input, init)
    }

    /// Whether two handles share the same underlying function
    pub fn ptr_eq(&self, other: &FetchFn) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for FetchFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchFn").finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> From<Arc<T>> for FetchFn {
    fn from(transport: Arc<T>) -> Self {
        Self::from_transport(transport)
    }
}

/// Runs the `onFetch` phase and the single transport call
#[derive(Debug)]
pub struct TransportInvoker<'a> {
    registry: &'a HookRegistry,
    base: &'a FetchFn,
}

impl<'a> TransportInvoker<'a> {
    pub fn new(registry: &'a HookRegistry, base: &'a FetchFn) -> Self {
        Self { registry, base }
    }

    /// Let every `onFetch` hook rebind the fetch function, returning the final binding
    ///
    /// # Errors
    ///
    /// Returns the first hook error unchanged.
    pub async fn bind(&self, request_init: &RequestInit) -> FetchResult<FetchFn> {
        let mut ctx = FetchContext::new(request_init, self.base.clone());

        for plugin in self.registry.for_phase(Phase::Fetch) {
            debug!(
                plugin = plugin.name(),
                request_id = %request_init.id,
                "Calling onFetch"
            );
            plugin.on_fetch(&mut ctx).await.map_err(|e| {
                error!(
                    "Plugin '{}' onFetch failed for {} {}: {}",
                    plugin.name(),
                    request_init.method,
                    request_init.url,
                    e
                );
                e
            })?;
        }

        Ok(ctx.into_fetch_fn())
    }

    /// Bind the fetch function and call it once
    ///
    /// # Errors
    ///
    /// Returns the first hook error, or the error of the final bound function,
    /// unchanged.
    pub async fn invoke(&self, request_init: Arc<RequestInit>) -> FetchResult<Response> {
        let fetch_fn = self.bind(&request_init).await?;
        let input = request_init.url.clone();

        debug!(request_id = %request_init.id, "Dispatching {} {}", request_init.method, input);
        fetch_fn.call(input, request_init).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::Plugin;
    use http::{Method, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TagPlugin(&'static str);

    #[async_trait]
    impl Plugin for TagPlugin {
        fn name(&self) -> &str {
            self.0
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn phases(&self) -> &[Phase] {
            &[Phase::Fetch]
        }

        async fn on_fetch(&self, ctx: &mut FetchContext<'_>) -> FetchResult<()> {
            let inner = ctx.fetch_fn().clone();
            let tag = self.0;
            ctx.set_fetch_fn(FetchFn::new(move |input, init| {
                let inner = inner.clone();
                async move {
                    let mut response = inner.call(input, init).await?;
                    response.headers.append("x-chain", tag.parse().unwrap());
                    Ok(response)
                }
            }));
            Ok(())
        }
    }

    fn counting_base(calls: Arc<AtomicUsize>) -> FetchFn {
        FetchFn::new(move |_input, _init| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Response::new(StatusCode::OK))
            }
        })
    }

    fn request() -> Arc<RequestInit> {
        Arc::new(RequestInit::new(
            Method::GET,
            Url::parse("https://example.com/items").unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_no_hooks_calls_base_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = counting_base(calls.clone());
        let registry = HookRegistry::new();

        let invoker = TransportInvoker::new(&registry, &base);
        let bound = invoker.bind(&request()).await.unwrap();
        assert!(bound.ptr_eq(&base));

        invoker.invoke(request()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrappers_compose_in_registration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = counting_base(calls.clone());
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(TagPlugin("inner")));
        registry.register(Arc::new(TagPlugin("outer")));

        let response = TransportInvoker::new(&registry, &base)
            .invoke(request())
            .await
            .unwrap();

        // The first-registered wrapper sits closest to the transport
        let chain: Vec<_> = response
            .headers
            .get_all("x-chain")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(chain, vec!["inner", "outer"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_trait_binding() {
        #[derive(Debug)]
        struct Static;

        #[async_trait]
        impl Transport for Static {
            async fn fetch(&self, input: Url, _init: Arc<RequestInit>) -> FetchResult<Response> {
                let mut response = Response::new(StatusCode::ACCEPTED);
                response.url = Some(input);
                Ok(response)
            }
        }

        let fetch_fn = FetchFn::from(Arc::new(Static));
        let init = request();
        let response = fetch_fn.call(init.url.clone(), init).await.unwrap();
        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.url.unwrap().path(), "/items");
    }
}
