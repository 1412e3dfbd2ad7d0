use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::debug;

/// Entries live for four hours unless a TTL is given.
pub const DEFAULT_TTL: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    timestamp: SystemTime,
    expires_at: SystemTime,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// In-memory key-value cache with per-entry expiry.
///
/// Expiry is checked lazily: an expired entry is evicted by the `get` or `has`
/// call that finds it. There is no capacity bound and no background sweep.
#[derive(Clone)]
pub struct TtlCache<V>
where
    V: Clone + Send + Sync,
{
    inner: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
    default_ttl: Duration,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            default_ttl,
        }
    }

    /// Returns the cached value, or `None` if it is missing or expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = SystemTime::now();
        let mut cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.is_expired(now) => {
                debug!("Cache entry expired for key: {key}");
                cache.remove(key);
                None
            }
            Some(entry) => {
                let age = now.duration_since(entry.timestamp).unwrap_or_default();
                debug!(?age, "Cache HIT for key: {key}");
                Some(entry.data.clone())
            }
            None => {
                debug!("Cache MISS for key: {key}");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let now = SystemTime::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            data: value,
            timestamp: now,
            expires_at: now + ttl,
        };

        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {key}");
        cache.insert(key.to_string(), entry);
    }

    pub async fn has(&self, key: &str) -> bool {
        let mut cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.is_expired(SystemTime::now()) => {
                cache.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub async fn delete(&self, key: &str) {
        let mut cache = self.inner.lock().await;
        cache.remove(key);
        debug!("Cache REMOVE for key: {key}");
    }

    pub async fn clear(&self) {
        let mut cache = self.inner.lock().await;
        cache.clear();
        debug!("Cache CLEAR");
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_cache_get_set() {
        let cache = TtlCache::<i32>::new();

        assert!(cache.get("key1").await.is_none());

        cache.set("key1", 123, None).await;
        assert_eq!(cache.get("key1").await, Some(123));

        assert!(cache.get("key2").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_ttl_expiration() {
        let cache = TtlCache::<i32>::new();

        cache.set("k", 7, Some(Duration::from_millis(10))).await;
        assert_eq!(cache.get("k").await, Some(7));
        assert!(cache.has("k").await);

        sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.is_none());
        assert!(!cache.has("k").await);
    }

    #[tokio::test]
    async fn test_cache_has_evicts_expired_entry() {
        let cache = TtlCache::<String>::new();

        cache
            .set("k", "v".to_string(), Some(Duration::from_millis(5)))
            .await;
        sleep(Duration::from_millis(15)).await;

        assert!(!cache.has("k").await);
        assert!(cache.inner.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_immediately_expired() {
        let cache = TtlCache::<i32>::new();
        cache.set("k", 1, Some(Duration::ZERO)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_default_ttl_applies_when_none_given() {
        let cache = TtlCache::<i32>::with_default_ttl(Duration::from_millis(10));
        cache.set("k", 1, None).await;
        assert_eq!(cache.get("k").await, Some(1));

        sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_delete_and_clear() {
        let cache = TtlCache::<i32>::new();

        cache.set("key1", 123, None).await;
        cache.set("key2", 456, None).await;

        cache.delete("key1").await;
        assert!(cache.get("key1").await.is_none());
        assert_eq!(cache.get("key2").await, Some(456));

        cache.clear().await;
        assert!(cache.get("key2").await.is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_entry() {
        let cache = TtlCache::<i32>::new();
        cache.set("k", 1, None).await;
        cache.set("k", 2, None).await;
        assert_eq!(cache.get("k").await, Some(2));
    }
}
