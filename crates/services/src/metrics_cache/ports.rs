use ad_platforms::{Ad, AdGroup, Campaign, DailyMetrics, Metrics, Paginated, Platform};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Campaign,
    AdGroup,
    Ad,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Campaign => "campaign",
            EntityKind::AdGroup => "ad_group",
            EntityKind::Ad => "ad",
        }
    }
}

/// Cache key scoped to one user's view of one platform account.
///
/// `date_range` is the normalized `since_until` fragment, or `all` for
/// listings without one. Entries for different users or accounts can never
/// collide because both ids are part of the key string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: Uuid,
    pub platform: Platform,
    pub account_id: String,
    pub entity: EntityKind,
    /// Discriminates series under the same entity, e.g. `daily`
    pub entity_id: Option<String>,
    pub date_range: String,
}

impl CacheKey {
    pub fn as_key_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.user_id,
            self.platform.as_str(),
            self.account_id,
            self.entity.as_str(),
            self.entity_id.as_deref().unwrap_or("-"),
            self.date_range,
        )
    }
}

/// Everything the reporting service caches, in one typed payload
#[derive(Debug, Clone)]
pub enum CachedPayload {
    Metrics(Metrics),
    Daily(Vec<DailyMetrics>),
    Campaigns(Paginated<Campaign>),
    AdGroups(Paginated<AdGroup>),
    Ads(Paginated<Ad>),
}

#[async_trait]
pub trait MetricsCache: Send + Sync {
    /// Returns the payload only while its TTL has not elapsed
    async fn get(&self, key: &CacheKey) -> Option<CachedPayload>;

    async fn put(&self, key: CacheKey, payload: CachedPayload, ttl: Duration);
}
