//! TTL caches in front of the market data source

use cached::{Cached, TimedCache};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key: stock code, data kind and a parameter fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub code: String,
    pub kind: &'static str,
    pub params: String,
}

impl CacheKey {
    pub fn new(code: impl Into<String>, kind: &'static str, params: impl ToString) -> Self {
        Self {
            code: code.into(),
            kind,
            params: params.to_string(),
        }
    }
}

/// Thread-safe cache of tool payloads
#[derive(Clone)]
pub struct StockCache {
    cache: Arc<RwLock<TimedCache<CacheKey, Value>>>,
}

impl StockCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        // TimedCache evicts on read, hence the write lock
        self.cache.write().await.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: Value) {
        self.cache.write().await.cache_set(key, value);
    }

    /// Return the cached value or fetch and cache it
    ///
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(code = %key.code, kind = key.kind, "cache hit");
            return Ok(value);
        }

        tracing::debug!(code = %key.code, kind = key.kind, "cache miss");
        let value = fetcher().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for StockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockCache").finish_non_exhaustive()
    }
}

/// Caches split by how quickly the data goes stale
#[derive(Debug, Clone)]
pub struct CacheSet {
    /// Quotes
    pub realtime: StockCache,
    /// Stock info and daily bars
    pub reference: StockCache,
}

impl CacheSet {
    pub fn new(realtime_ttl: Duration, reference_ttl: Duration) -> Self {
        Self {
            realtime: StockCache::new(realtime_ttl),
            reference: StockCache::new(reference_ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_get_or_fetch_caches_success() {
        let cache = StockCache::new(Duration::from_secs(60));
        let calls = AtomicU32::new(0);
        let key = CacheKey::new("600519", "kline", 30);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(key.clone(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(json!({"bars": []}))
                })
                .await
                .unwrap();
            assert_eq!(value, json!({"bars": []}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("600519", "info", "");
        let first: Result<Value, &str> = cache.get_or_fetch(key.clone(), || async { Err("down") }).await;
        assert!(first.is_err());
        assert!(cache.is_empty().await);

        let second: Result<Value, &str> = cache.get_or_fetch(key, || async { Ok(json!(1)) }).await;
        assert_eq!(second.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = StockCache::new(Duration::from_secs(1));
        let key = CacheKey::new("000001", "quote", "");
        cache.insert(key.clone(), json!(10.5)).await;
        assert!(cache.get(&key).await.is_some());
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[test]
    fn test_keys_differ_by_params() {
        assert_ne!(CacheKey::new("600519", "kline", 30), CacheKey::new("600519", "kline", 60));
    }
}
