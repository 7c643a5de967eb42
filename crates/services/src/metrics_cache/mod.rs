pub mod ports;

pub use ports::*;

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry {
    payload: CachedPayload,
    ttl: Duration,
    expires_at: Instant,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process metrics cache with a per-entry TTL.
///
/// Each entry also records its own deadline and `get` checks it, so a
/// zero-TTL put is absent immediately rather than whenever the eviction
/// pass happens to run.
pub struct MokaMetricsCache {
    inner: Cache<String, Entry>,
}

impl MokaMetricsCache {
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }
}

impl Default for MokaMetricsCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl MetricsCache for MokaMetricsCache {
    async fn get(&self, key: &CacheKey) -> Option<CachedPayload> {
        let entry = self.inner.get(&key.as_key_string()).await?;
        if Instant::now() < entry.expires_at {
            Some(entry.payload)
        } else {
            None
        }
    }

    async fn put(&self, key: CacheKey, payload: CachedPayload, ttl: Duration) {
        let entry = Entry {
            payload,
            ttl,
            expires_at: Instant::now() + ttl,
        };
        self.inner.insert(key.as_key_string(), entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_platforms::{Metrics, Platform};
    use uuid::Uuid;

    fn key(user: Uuid, entity: EntityKind, entity_id: Option<&str>, range: &str) -> CacheKey {
        CacheKey {
            user_id: user,
            platform: Platform::Facebook,
            account_id: "act_1".to_string(),
            entity,
            entity_id: entity_id.map(str::to_string),
            date_range: range.to_string(),
        }
    }

    fn metrics(impressions: u64) -> Metrics {
        Metrics::from_base(impressions, impressions / 20, impressions as f64 / 10.0)
    }

    #[tokio::test]
    async fn round_trips_within_ttl() {
        let cache = MokaMetricsCache::default();
        let user = Uuid::new_v4();
        let key = key(user, EntityKind::Account, None, "2024-01-01_2024-01-31");

        cache
            .put(
                key.clone(),
                CachedPayload::Metrics(metrics(1000)),
                Duration::from_secs(300),
            )
            .await;

        match cache.get(&key).await {
            Some(CachedPayload::Metrics(m)) => assert_eq!(m.impressions, 1000),
            other => panic!("expected cached metrics, got {:?}", other.is_some()),
        }
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_immediately_absent() {
        let cache = MokaMetricsCache::default();
        let key = key(Uuid::new_v4(), EntityKind::Account, None, "2024-01-01_2024-01-31");

        cache
            .put(key.clone(), CachedPayload::Metrics(metrics(1000)), Duration::ZERO)
            .await;

        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_collide() {
        let cache = MokaMetricsCache::default();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let ttl = Duration::from_secs(300);

        cache
            .put(
                key(user_a, EntityKind::Account, None, "2024-01-01_2024-01-31"),
                CachedPayload::Metrics(metrics(1000)),
                ttl,
            )
            .await;
        cache
            .put(
                key(user_a, EntityKind::Account, Some("daily"), "2024-01-01_2024-01-31"),
                CachedPayload::Daily(vec![]),
                ttl,
            )
            .await;

        // Same shape of key for a different user misses
        assert!(cache
            .get(&key(user_b, EntityKind::Account, None, "2024-01-01_2024-01-31"))
            .await
            .is_none());
        // Different date range misses
        assert!(cache
            .get(&key(user_a, EntityKind::Account, None, "2024-02-01_2024-02-29"))
            .await
            .is_none());
        // The daily series and the aggregate live under distinct keys
        assert!(matches!(
            cache
                .get(&key(user_a, EntityKind::Account, None, "2024-01-01_2024-01-31"))
                .await,
            Some(CachedPayload::Metrics(_))
        ));
        assert!(matches!(
            cache
                .get(&key(user_a, EntityKind::Account, Some("daily"), "2024-01-01_2024-01-31"))
                .await,
            Some(CachedPayload::Daily(_))
        ));
    }
}
