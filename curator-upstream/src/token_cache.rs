//! Single-flight access-token cache. Port of
//! `original_source/backend/app/pixiv/access_token_cache.py`, built with
//! the teacher's per-key-mutex idiom over a shared map
//! (`ando-proxy::health_check` keeps an `Arc<RwLock<HashMap<..>>>` for the
//! same reason: cheap concurrent reads, a lock only around the map
//! mutation itself).

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

pub const DEFAULT_REFRESH_MARGIN_S: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct OauthToken {
    pub access_token: String,
    pub expires_in_s: f64,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, token_id: i64) -> anyhow::Result<OauthToken>;
}

#[derive(Clone)]
struct CachedAccessToken {
    access_token: String,
    expires_at: f64,
}

impl CachedAccessToken {
    fn is_valid(&self, now: f64, refresh_margin_s: f64) -> bool {
        !self.access_token.is_empty() && now < (self.expires_at - refresh_margin_s)
    }
}

fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

pub struct AccessTokenCache {
    items: DashMap<i64, CachedAccessToken>,
    locks: DashMap<i64, Arc<Mutex<()>>>,
    refresh_margin_s: f64,
}

impl AccessTokenCache {
    pub fn new(refresh_margin_s: f64) -> Self {
        Self {
            items: DashMap::new(),
            locks: DashMap::new(),
            refresh_margin_s: refresh_margin_s.max(0.0),
        }
    }

    pub fn get(&self, key: i64) -> Option<String> {
        let item = self.items.get(&key)?;
        if item.is_valid(unix_now(), self.refresh_margin_s) {
            Some(item.access_token.clone())
        } else {
            None
        }
    }

    pub fn set(&self, key: i64, access_token: &str, expires_in_s: f64) {
        let access_token = access_token.trim();
        if access_token.is_empty() || expires_in_s <= 0.0 {
            self.items.remove(&key);
            return;
        }
        self.items.insert(
            key,
            CachedAccessToken {
                access_token: access_token.to_string(),
                expires_at: unix_now() + expires_in_s,
            },
        );
    }

    pub fn invalidate(&self, key: i64) {
        self.items.remove(&key);
    }

    /// Returns the cached token if still valid; otherwise takes the
    /// per-key lock, re-checks (another caller may have refreshed while
    /// this one waited), and calls `refresher` at most once.
    pub async fn get_or_refresh(&self, key: i64, refresher: &dyn TokenRefresher) -> anyhow::Result<String> {
        if let Some(cached) = self.get(key) {
            return Ok(cached);
        }

        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(cached) = self.get(key) {
            return Ok(cached);
        }

        let token = refresher.refresh(key).await?;
        self.set(key, &token.access_token, token.expires_in_s);
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, _token_id: i64) -> anyhow::Result<OauthToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(OauthToken { access_token: "fresh".into(), expires_in_s: 3600.0 })
        }
    }

    #[tokio::test]
    async fn get_or_refresh_is_single_flight_per_key() {
        let cache = Arc::new(AccessTokenCache::new(60.0));
        let refresher = Arc::new(CountingRefresher { calls: AtomicUsize::new(0) });

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let refresher: Arc<CountingRefresher> = Arc::clone(&refresher);
            handles.push(tokio::spawn(async move {
                cache.get_or_refresh(1, refresher.as_ref()).await.unwrap()
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), "fresh");
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_with_zero_or_negative_ttl_evicts_instead_of_caching() {
        let cache = AccessTokenCache::new(60.0);
        cache.set(1, "x", 0.0);
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = AccessTokenCache::new(60.0);
        cache.items.insert(1, CachedAccessToken { access_token: "old".into(), expires_at: unix_now() - 10.0 });
        assert!(cache.get(1).is_none());
    }
}
