//! Response caching with TTL, layered over the fetch function

use async_trait::async_trait;
use http::Method;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::FetchResult;
use crate::fetch::FetchFn;
use crate::plugins::core::{FetchContext, Phase, Plugin};
use crate::request::RequestInit;
use crate::response::Response;

/// Configuration for caching behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    pub max_entries: usize,

    /// Time-to-live for cached entries in seconds
    pub ttl_seconds: u64,

    /// Methods whose responses are cached
    pub methods: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_seconds: 300,
            methods: vec![Method::GET.to_string(), Method::HEAD.to_string()],
        }
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub stored: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: Response,
    stored_at: Instant,
}

#[derive(Debug)]
struct ResponseCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
    stats: Mutex<CacheStats>,
}

impl ResponseCache {
    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_seconds)
    }

    fn key_for(&self, init: &RequestInit) -> Option<String> {
        let method = init.method.as_str();
        self.config
            .methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
            .then(|| format!("{} {}", method, init.url))
    }

    fn get(&self, key: &str) -> Option<Response> {
        let ttl = self.ttl();
        let mut entries = self.entries.lock();
        let mut stats = self.stats.lock();

        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= ttl => {
                stats.hits += 1;
                return Some(entry.response.clone());
            }
            Some(_) => {
                entries.remove(key);
                stats.evictions += 1;
            }
            None => {}
        }
        stats.misses += 1;
        None
    }

    fn store(&self, key: String, response: &Response) {
        if self.config.max_entries == 0 {
            return;
        }

        let ttl = self.ttl();
        let mut entries = self.entries.lock();
        let mut stats = self.stats.lock();

        if entries.len() >= self.config.max_entries && !entries.contains_key(&key) {
            let before = entries.len();
            entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);

            // Still full: drop the oldest
            if entries.len() >= self.config.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
            stats.evictions += (before - entries.len()) as u64;
        }

        entries.insert(
            key,
            CacheEntry {
                response: response.clone(),
                stored_at: Instant::now(),
            },
        );
        stats.stored += 1;
    }
}

/// Plugin that serves repeated requests from memory
///
/// Only successful responses are stored. A cache hit returns without calling
/// the wrapped fetch function at all.
#[derive(Debug, Clone)]
pub struct CachePlugin {
    cache: Arc<ResponseCache>,
}

impl CachePlugin {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: Arc::new(ResponseCache {
                config,
                entries: Mutex::new(HashMap::new()),
                stats: Mutex::new(CacheStats::default()),
            }),
        }
    }

    pub fn stats(&self) -> CacheStats {
        *self.cache.stats.lock()
    }

    pub fn len(&self) -> usize {
        self.cache.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached response
    pub fn clear(&self) {
        self.cache.entries.lock().clear();
    }
}

impl Default for CachePlugin {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl Plugin for CachePlugin {
    fn name(&self) -> &str {
        "cache"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> Option<&str> {
        Some("Response caching with TTL")
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::Fetch]
    }

    async fn on_fetch(&self, ctx: &mut FetchContext<'_>) -> FetchResult<()> {
        let Some(key) = self.cache.key_for(ctx.request_init) else {
            return Ok(());
        };

        let inner = ctx.fetch_fn().clone();
        let cache = self.cache.clone();

        ctx.set_fetch_fn(FetchFn::new(move |input, init| {
            let inner = inner.clone();
            let cache = cache.clone();
            let key = key.clone();
            async move {
                if let Some(response) = cache.get(&key) {
                    debug!(request_id = %init.id, "Cache hit: {}", key);
                    return Ok(response);
                }

                debug!(request_id = %init.id, "Cache miss: {}", key);
                let response = inner.call(input, init).await?;
                if response.is_success() {
                    cache.store(key, &response);
                }
                Ok(response)
            }
        }));
        Ok(())
    }
}
