//! Runs the hook pipeline against an in-process fetch function
//!
//! ```sh
//! RUST_LOG=hookfetch=debug cargo run -p hookfetch --example pipeline
//! ```

use hookfetch::cookies::CookieStore;
use hookfetch::header::{HeaderValue, SET_COOKIE};
use hookfetch::plugins::{
    CacheConfig, CachePlugin, DefaultHeadersPlugin, MetricsPlugin, RetryConfig, RetryPlugin,
};
use hookfetch::{Client, FetchFn, FetchResult, Response, StatusCode, Url};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> FetchResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    // Fails the first call, then answers and sets a session cookie
    let calls = Arc::new(AtomicUsize::new(0));
    let server = {
        let calls = calls.clone();
        FetchFn::new(move |input, init| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(hookfetch::FetchError::transport("connection reset"));
                }
                let body = format!(
                    "{} {} cookie={:?}",
                    init.method,
                    input.path(),
                    init.header("cookie")
                );
                Ok(Response::new(StatusCode::OK)
                    .with_header(SET_COOKIE, HeaderValue::from_static("session=42; Path=/"))
                    .with_body(body))
            }
        })
    };

    let cookies = Arc::new(CookieStore::default());
    let metrics = Arc::new(MetricsPlugin::new());
    let client = Client::builder()
        .with_base_url(Url::parse("https://demo.local/api").unwrap())
        .with_plugin(metrics.clone())
        .with_plugin(Arc::new(DefaultHeadersPlugin::bearer("demo-token")?))
        .with_cookie_store(cookies.clone())
        .with_plugin(Arc::new(RetryPlugin::new(RetryConfig {
            base_delay_ms: 10,
            ..RetryConfig::default()
        })))
        .with_plugin(Arc::new(CachePlugin::new(CacheConfig::default())))
        .with_fetch_fn(server)
        .build()?;

    for path in ["/profile", "/profile", "/orders"] {
        let response = client.get(path).send().await?;
        println!("{} -> {} {}", path, response.status, response.text()?);
    }

    println!("transport calls: {}", calls.load(Ordering::SeqCst));
    println!("cookies: {}", cookies.cookie_string());
    println!("metrics: {:?}", metrics.get_metrics().method_metrics);
    Ok(())
}
