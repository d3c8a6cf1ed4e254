//! Cookie plugin tests: header injection, Set-Cookie capture and a store
//! shared by concurrent requests

use hookfetch::cookies::{CookieChangeEvent, CookieStore};
use hookfetch::header::{COOKIE, HeaderValue, SET_COOKIE};
use hookfetch::{Client, FetchFn, RequestInit, Response, StatusCode, Url};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Echo server: reports the received `Cookie` header in the body and sets
/// the cookies listed in the `x-set` request header
fn cookie_server(received: Arc<Mutex<Vec<Option<String>>>>) -> FetchFn {
    FetchFn::new(move |input: Url, init: Arc<RequestInit>| {
        let received = received.clone();
        async move {
            let cookie = init.header(COOKIE.as_str()).map(str::to_string);
            received.lock().unwrap().push(cookie.clone());

            if let Some(delay) = init.header("x-delay-ms").and_then(|v| v.parse().ok()) {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let mut response = Response::new(StatusCode::OK).with_body(cookie.unwrap_or_default());
            for set in init.headers.get_all("x-set") {
                response.headers.append(SET_COOKIE, set.clone());
            }
            response.url = Some(input);
            Ok(response)
        }
    })
}

fn client(store: &Arc<CookieStore>, received: &Arc<Mutex<Vec<Option<String>>>>) -> Client {
    Client::builder()
        .with_base_url(Url::parse("https://shop.example.com").unwrap())
        .with_cookie_store(store.clone())
        .with_fetch_fn(cookie_server(received.clone()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_initial_cookie_string_is_sent() {
    let store = Arc::new(CookieStore::new("session=abc; theme=dark"));
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = client(&store, &received);

    let response = client.get("/").send().await.unwrap();

    assert_eq!(response.text().unwrap(), "session=abc; theme=dark");
}

#[tokio::test]
async fn test_set_cookie_is_sent_on_next_request() {
    let store = Arc::new(CookieStore::default());
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = client(&store, &received);

    client
        .post("/login")
        .header("x-set", "token=t1; Path=/; Secure; HttpOnly")
        .send()
        .await
        .unwrap();
    client.get("/cart").send().await.unwrap();

    let received = received.lock().unwrap().clone();
    assert_eq!(received, vec![None, Some("token=t1".to_string())]);
    assert!(store.get("token").unwrap().secure);
}

#[tokio::test]
async fn test_path_and_domain_scoping() {
    let store = Arc::new(CookieStore::default());
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = client(&store, &received);

    client
        .get("/")
        .header("x-set", "admin=1; Path=/admin")
        .send()
        .await
        .unwrap();

    let response = client.get("/shop").send().await.unwrap();
    assert_eq!(response.text().unwrap(), "");

    let response = client.get("/admin/users").send().await.unwrap();
    assert_eq!(response.text().unwrap(), "admin=1");

    // A different host never sees a cookie scoped to shop.example.com
    store
        .set_with(hookfetch::cookies::CookieRecord::new("scoped", "1").with_domain("shop.example.com"))
        .unwrap();
    let response = client.get("https://other.org/").send().await.unwrap();
    assert!(!response.text().unwrap().contains("scoped"));
}

#[tokio::test]
async fn test_host_only_cookie_stays_with_its_origin() {
    let store = Arc::new(CookieStore::default());
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = client(&store, &received);

    client
        .get("https://a.example/login")
        .header("x-set", "sid=secret")
        .send()
        .await
        .unwrap();

    let other = client.get("https://b.other/").send().await.unwrap();
    let subdomain = client.get("https://api.a.example/").send().await.unwrap();
    let origin = client.get("https://a.example/profile").send().await.unwrap();

    assert_eq!(other.text().unwrap(), "");
    assert_eq!(subdomain.text().unwrap(), "");
    assert_eq!(origin.text().unwrap(), "sid=secret");
    let sid = store.get("sid").unwrap();
    assert!(sid.host_only);
    assert_eq!(sid.domain.as_deref(), Some("a.example"));
}

#[tokio::test]
async fn test_domain_cookie_reaches_subdomains_only() {
    let store = Arc::new(CookieStore::default());
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = client(&store, &received);

    client
        .get("https://a.example/")
        .header("x-set", "pref=1; Domain=a.example")
        .send()
        .await
        .unwrap();

    let subdomain = client.get("https://api.a.example/").send().await.unwrap();
    let other = client.get("https://b.other/").send().await.unwrap();

    assert_eq!(subdomain.text().unwrap(), "pref=1");
    assert_eq!(other.text().unwrap(), "");
}

#[tokio::test]
async fn test_caller_cookie_header_is_merged() {
    let store = Arc::new(CookieStore::new("session=abc"));
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = client(&store, &received);

    let response = client
        .get("/")
        .header("cookie", "ab=test")
        .send()
        .await
        .unwrap();

    assert_eq!(response.text().unwrap(), "ab=test; session=abc");
}

#[tokio::test]
async fn test_plugin_updates_notify_listeners() {
    let store = Arc::new(CookieStore::new("stale=1"));
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = client(&store, &received);

    let events: Arc<Mutex<Vec<CookieChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    store.subscribe(Arc::new(move |event: &CookieChangeEvent| {
        sink.lock().unwrap().push(event.clone());
    }));

    client
        .get("/")
        .headers([("x-set", "fresh=1")])
        .send()
        .await
        .unwrap();
    client
        .get("/")
        .header("x-set", "stale=; Max-Age=0")
        .send()
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].changed().next().unwrap().name, "fresh");
    assert_eq!(events[1].deleted().next().unwrap().name, "stale");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_lose_updates() {
    for _ in 0..20 {
        let store = Arc::new(CookieStore::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let client = client(&store, &received);

        let first = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .get("/a")
                    .header("x-set", "shared=from-a")
                    .header("x-delay-ms", "1")
                    .send()
                    .await
            })
        };
        let second = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .get("/b")
                    .header("x-set", "shared=from-b")
                    .send()
                    .await
            })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let shared = store.get_all_named("shared");
        assert_eq!(shared.len(), 1);
        assert!(["from-a", "from-b"].contains(&shared[0].value.as_str()));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_cookies_all_recorded() {
    let store = Arc::new(CookieStore::default());
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = client(&store, &received);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .get("/")
                    .header("x-set", format!("c{i}={i}"))
                    .send()
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.len(), 16);
    for i in 0..16 {
        assert_eq!(store.get(&format!("c{i}")).unwrap().value, i.to_string());
    }

    let header = HeaderValue::from_str(&store.cookie_string()).unwrap();
    assert_eq!(header.to_str().unwrap().matches("; ").count(), 15);
}
