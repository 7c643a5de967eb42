//! Reporting facade over the platform adapters
//!
//! Every read goes through the same pipeline: subscription check, session
//! lookup (with transparent refresh), seat check for the selected account,
//! then the cache, then the adapter.

use ad_platforms::{
    AccountList, AccountListing, Ad, AdGroup, Campaign, CampaignQueryable, DailyMetrics,
    DateRange, EntityFilter, Metrics, MetricsQueryable, Paginated, Platform,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::access::AccessGate;
use crate::common::CoreError;
use crate::metrics_cache::{CacheKey, CachedPayload, EntityKind, MetricsCache};
use crate::sessions::{PlatformSession, SessionStore, UserId};

/// Capability objects and cache policy for one connected platform
#[derive(Clone)]
pub struct PlatformHandle {
    pub campaigns: Arc<dyn CampaignQueryable>,
    pub metrics: Arc<dyn MetricsQueryable>,
    pub accounts: Arc<dyn AccountListing>,
    pub cache_ttl: Duration,
}

pub struct ReportingServiceImpl {
    sessions: Arc<dyn SessionStore>,
    gate: Arc<dyn AccessGate>,
    cache: Arc<dyn MetricsCache>,
    platforms: HashMap<Platform, PlatformHandle>,
}

impl ReportingServiceImpl {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        gate: Arc<dyn AccessGate>,
        cache: Arc<dyn MetricsCache>,
        platforms: HashMap<Platform, PlatformHandle>,
    ) -> Self {
        Self {
            sessions,
            gate,
            cache,
            platforms,
        }
    }

    fn handle(&self, platform: Platform) -> Result<&PlatformHandle, CoreError> {
        self.platforms
            .get(&platform)
            .ok_or_else(|| CoreError::BadRequest(format!("unsupported platform {platform}")))
    }

    /// Shared front half of every account-scoped read
    async fn authorize(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<(PlatformSession, String), CoreError> {
        self.gate.validate_subscription(user_id, platform).await?;
        let session = self.sessions.get(user_id, platform).await?;
        let ad_session = session.as_ad_session();
        let account_id = ad_session.require_account()?.to_string();
        self.gate
            .validate_account_access(user_id, platform, &account_id)
            .await?;
        Ok((session, account_id))
    }

    fn cache_key(
        user_id: &UserId,
        platform: Platform,
        account_id: &str,
        entity: EntityKind,
        entity_id: Option<&str>,
        range: Option<&DateRange>,
    ) -> CacheKey {
        CacheKey {
            user_id: user_id.0,
            platform,
            account_id: account_id.to_string(),
            entity,
            entity_id: entity_id.map(str::to_string),
            date_range: range
                .map(DateRange::cache_fragment)
                .unwrap_or_else(|| "all".to_string()),
        }
    }

    /// Aggregated account-level metrics over the range
    pub async fn account_metrics(
        &self,
        user_id: &UserId,
        platform: Platform,
        range: &DateRange,
    ) -> Result<Metrics, CoreError> {
        let handle = self.handle(platform)?.clone();
        let (session, account_id) = self.authorize(user_id, platform).await?;
        let key = Self::cache_key(
            user_id,
            platform,
            &account_id,
            EntityKind::Account,
            None,
            Some(range),
        );

        if let Some(CachedPayload::Metrics(metrics)) = self.cache.get(&key).await {
            tracing::debug!(user_id = %user_id, %platform, "Account metrics served from cache");
            return Ok(metrics);
        }

        let metrics = handle
            .metrics
            .account_metrics(&session.as_ad_session(), range)
            .await?;
        self.cache
            .put(key, CachedPayload::Metrics(metrics.clone()), handle.cache_ttl)
            .await;
        Ok(metrics)
    }

    /// One metrics row per day in the range
    pub async fn metrics_by_date(
        &self,
        user_id: &UserId,
        platform: Platform,
        range: &DateRange,
    ) -> Result<Vec<DailyMetrics>, CoreError> {
        let handle = self.handle(platform)?.clone();
        let (session, account_id) = self.authorize(user_id, platform).await?;
        // `daily` keeps the series from colliding with the aggregate
        let key = Self::cache_key(
            user_id,
            platform,
            &account_id,
            EntityKind::Account,
            Some("daily"),
            Some(range),
        );

        if let Some(CachedPayload::Daily(daily)) = self.cache.get(&key).await {
            return Ok(daily);
        }

        let daily = handle
            .metrics
            .metrics_by_date(&session.as_ad_session(), range)
            .await?;
        self.cache
            .put(key, CachedPayload::Daily(daily.clone()), handle.cache_ttl)
            .await;
        Ok(daily)
    }

    pub async fn campaigns(
        &self,
        user_id: &UserId,
        platform: Platform,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Campaign>, CoreError> {
        let handle = self.handle(platform)?.clone();
        let (session, account_id) = self.authorize(user_id, platform).await?;

        // Filtered listings bypass the cache; the filter space is unbounded
        if filter.is_some() {
            return Ok(handle
                .campaigns
                .campaigns(&session.as_ad_session(), filter, range)
                .await?);
        }

        let key = Self::cache_key(
            user_id,
            platform,
            &account_id,
            EntityKind::Campaign,
            None,
            range,
        );
        if let Some(CachedPayload::Campaigns(page)) = self.cache.get(&key).await {
            return Ok(page);
        }

        let page = handle
            .campaigns
            .campaigns(&session.as_ad_session(), None, range)
            .await?;
        self.cache
            .put(key, CachedPayload::Campaigns(page.clone()), handle.cache_ttl)
            .await;
        Ok(page)
    }

    pub async fn ad_groups(
        &self,
        user_id: &UserId,
        platform: Platform,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<AdGroup>, CoreError> {
        let handle = self.handle(platform)?.clone();
        let (session, account_id) = self.authorize(user_id, platform).await?;

        if filter.is_some() {
            return Ok(handle
                .campaigns
                .ad_groups(&session.as_ad_session(), filter, range)
                .await?);
        }

        let key = Self::cache_key(
            user_id,
            platform,
            &account_id,
            EntityKind::AdGroup,
            None,
            range,
        );
        if let Some(CachedPayload::AdGroups(page)) = self.cache.get(&key).await {
            return Ok(page);
        }

        let page = handle
            .campaigns
            .ad_groups(&session.as_ad_session(), None, range)
            .await?;
        self.cache
            .put(key, CachedPayload::AdGroups(page.clone()), handle.cache_ttl)
            .await;
        Ok(page)
    }

    pub async fn ads(
        &self,
        user_id: &UserId,
        platform: Platform,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Ad>, CoreError> {
        let handle = self.handle(platform)?.clone();
        let (session, account_id) = self.authorize(user_id, platform).await?;

        if filter.is_some() {
            return Ok(handle
                .campaigns
                .ads(&session.as_ad_session(), filter, range)
                .await?);
        }

        let key = Self::cache_key(user_id, platform, &account_id, EntityKind::Ad, None, range);
        if let Some(CachedPayload::Ads(page)) = self.cache.get(&key).await {
            return Ok(page);
        }

        let page = handle
            .campaigns
            .ads(&session.as_ad_session(), None, range)
            .await?;
        self.cache
            .put(key, CachedPayload::Ads(page.clone()), handle.cache_ttl)
            .await;
        Ok(page)
    }

    /// Accounts the stored token can see, for account selection.
    ///
    /// Runs before any seat exists, so only the plan is checked, and the
    /// result is never cached.
    pub async fn accounts(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<AccountList, CoreError> {
        let handle = self.handle(platform)?.clone();
        self.gate.active_subscription(user_id, platform).await?;
        let session = self.sessions.get(user_id, platform).await?;

        let list = handle.accounts.accounts(&session.as_ad_session()).await?;
        if list.skipped > 0 {
            tracing::warn!(
                user_id = %user_id,
                %platform,
                skipped = list.skipped,
                "Some ad accounts could not be listed"
            );
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{
        AccessGateImpl, Subscription, SubscriptionId, SubscriptionStatus,
    };
    use crate::metrics_cache::MokaMetricsCache;
    use crate::sessions::{SaveSession, SessionStoreImpl};
    use crate::test_utils::{
        InMemorySeatRepository, InMemorySessionRepository, InMemorySubscriptionRepository,
    };
    use ad_platforms::{MockAdapter, TokenRefresher};
    use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
    use uuid::Uuid;

    struct Fixture {
        service: ReportingServiceImpl,
        adapter: Arc<MockAdapter>,
        gate: Arc<AccessGateImpl>,
        user: UserId,
    }

    async fn fixture(connected: bool, seated: bool) -> Fixture {
        let adapter = Arc::new(MockAdapter::new());
        let session_repo = Arc::new(InMemorySessionRepository::new());
        let subscription_repo = Arc::new(InMemorySubscriptionRepository::new());
        let seat_repo = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());

        subscription_repo.put(Subscription {
            id: SubscriptionId("sub-1".to_string()),
            user_id: user.clone(),
            platform: None,
            plan_id: "plan-growth".to_string(),
            plan_name: "Growth".to_string(),
            billing_cycle: "monthly".to_string(),
            status: SubscriptionStatus::Active,
            quantity: 5,
            current_period_start: Utc::now() - ChronoDuration::days(1),
            current_period_end: Utc::now() + ChronoDuration::days(29),
        });

        let mut refreshers: HashMap<Platform, Arc<dyn TokenRefresher>> = HashMap::new();
        refreshers.insert(Platform::Facebook, adapter.clone());
        let sessions = Arc::new(SessionStoreImpl::new(session_repo, refreshers));
        let gate = Arc::new(AccessGateImpl::new(subscription_repo, seat_repo));

        if connected {
            sessions
                .save(SaveSession {
                    user_id: user.clone(),
                    platform: Platform::Facebook,
                    access_token: "token".to_string(),
                    refresh_token: None,
                    account_id: Some("act_1".to_string()),
                    account_name: Some("Main".to_string()),
                    expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
                    refresh_expires_at: None,
                })
                .await
                .expect("save session");
        }
        if seated {
            gate.add_seat(
                &SubscriptionId("sub-1".to_string()),
                &user,
                Platform::Facebook,
                "act_1",
            )
            .await
            .expect("add seat");
        }

        let mut platforms = HashMap::new();
        platforms.insert(
            Platform::Facebook,
            PlatformHandle {
                campaigns: adapter.clone(),
                metrics: adapter.clone(),
                accounts: adapter.clone(),
                cache_ttl: Duration::from_secs(300),
            },
        );
        let service = ReportingServiceImpl::new(
            sessions,
            gate.clone(),
            Arc::new(MokaMetricsCache::default()),
            platforms,
        );

        Fixture {
            service,
            adapter,
            gate,
            user,
        }
    }

    fn january() -> DateRange {
        DateRange {
            since: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            until: NaiveDate::from_ymd_opt(2024, 1, 31).expect("date"),
        }
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let fx = fixture(true, true).await;
        let range = january();

        let first = fx
            .service
            .account_metrics(&fx.user, Platform::Facebook, &range)
            .await
            .expect("first read");
        assert_eq!(first.impressions, 1000);
        assert_eq!(fx.adapter.call_count(), 1);

        let second = fx
            .service
            .account_metrics(&fx.user, Platform::Facebook, &range)
            .await
            .expect("second read");
        assert_eq!(second.impressions, 1000);
        assert_eq!(fx.adapter.call_count(), 1);
    }

    #[tokio::test]
    async fn different_range_misses_the_cache() {
        let fx = fixture(true, true).await;

        fx.service
            .account_metrics(&fx.user, Platform::Facebook, &january())
            .await
            .expect("january");
        let february = DateRange {
            since: NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"),
            until: NaiveDate::from_ymd_opt(2024, 2, 29).expect("date"),
        };
        fx.service
            .account_metrics(&fx.user, Platform::Facebook, &february)
            .await
            .expect("february");
        assert_eq!(fx.adapter.call_count(), 2);
    }

    #[tokio::test]
    async fn daily_series_and_aggregate_cache_separately() {
        let fx = fixture(true, true).await;
        let range = january();

        fx.service
            .account_metrics(&fx.user, Platform::Facebook, &range)
            .await
            .expect("aggregate");
        let daily = fx
            .service
            .metrics_by_date(&fx.user, Platform::Facebook, &range)
            .await
            .expect("daily");
        assert!(daily.is_empty());
        assert_eq!(fx.adapter.call_count(), 2);

        fx.service
            .metrics_by_date(&fx.user, Platform::Facebook, &range)
            .await
            .expect("daily again");
        assert_eq!(fx.adapter.call_count(), 2);
    }

    #[tokio::test]
    async fn campaign_listing_is_cached_only_when_unfiltered() {
        let fx = fixture(true, true).await;

        let page = fx
            .service
            .campaigns(&fx.user, Platform::Facebook, None, None)
            .await
            .expect("campaigns");
        assert_eq!(page.items.len(), 1);
        fx.service
            .campaigns(&fx.user, Platform::Facebook, None, None)
            .await
            .expect("cached campaigns");
        assert_eq!(fx.adapter.call_count(), 1);

        let filter = EntityFilter {
            ids: Some(vec!["campaign-1".to_string()]),
            status: None,
        };
        fx.service
            .campaigns(&fx.user, Platform::Facebook, Some(&filter), None)
            .await
            .expect("filtered");
        fx.service
            .campaigns(&fx.user, Platform::Facebook, Some(&filter), None)
            .await
            .expect("filtered again");
        assert_eq!(fx.adapter.call_count(), 3);
    }

    #[tokio::test]
    async fn missing_session_is_unauthorized() {
        let fx = fixture(false, true).await;

        let err = fx
            .service
            .account_metrics(&fx.user, Platform::Facebook, &january())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
        assert_eq!(fx.adapter.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_seat_is_forbidden() {
        let fx = fixture(true, false).await;

        let err = fx
            .service
            .account_metrics(&fx.user, Platform::Facebook, &january())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert_eq!(fx.adapter.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_subscription_is_forbidden_before_session_lookup() {
        let fx = fixture(true, true).await;
        let other_user = UserId(Uuid::new_v4());

        let err = fx
            .service
            .account_metrics(&other_user, Platform::Facebook, &january())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn accounts_listing_needs_only_a_subscription() {
        let fx = fixture(true, false).await;

        let list = fx
            .service
            .accounts(&fx.user, Platform::Facebook)
            .await
            .expect("accounts");
        assert_eq!(list.accounts.len(), 1);
        assert_eq!(list.skipped, 0);
        // No seat exists yet; listing is what account selection is for
        assert!(fx
            .gate
            .validate_account_access(&fx.user, Platform::Facebook, "acct-1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unknown_platform_is_a_bad_request() {
        let fx = fixture(true, true).await;

        let err = fx
            .service
            .account_metrics(&fx.user, Platform::TikTok, &january())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }
}
