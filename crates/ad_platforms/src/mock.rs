//! Mock adapter for testing
//!
//! Serves canned data for every capability trait without touching the
//! network, and counts calls so callers can assert on cache behavior.

use crate::models::{
    AccountList, Ad, AdAccount, AdGroup, AdSession, Campaign, DailyMetrics, DateRange,
    EntityFilter, EntityStatus, Metrics, Paginated, PlatformError, RefreshedToken,
};
use crate::{AccountListing, CampaignQueryable, MetricsQueryable, TokenRefresher};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Canned-data adapter implementing every capability trait
pub struct MockAdapter {
    campaigns: Vec<Campaign>,
    ad_groups: Vec<AdGroup>,
    ads: Vec<Ad>,
    metrics: Metrics,
    daily: Vec<DailyMetrics>,
    accounts: AccountList,
    refreshed: Mutex<Option<RefreshedToken>>,
    fail_with: Mutex<Option<PlatformError>>,
    calls: AtomicUsize,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            campaigns: vec![Campaign {
                id: "campaign-1".to_string(),
                name: "Mock campaign".to_string(),
                status: EntityStatus::Active,
                objective: Some("TRAFFIC".to_string()),
                daily_budget: Some(50.0),
                lifetime_budget: None,
                metrics: None,
            }],
            ad_groups: Vec::new(),
            ads: Vec::new(),
            metrics: Metrics::from_base(1000, 50, 100.0),
            daily: Vec::new(),
            accounts: AccountList {
                accounts: vec![AdAccount {
                    id: "acct-1".to_string(),
                    name: "Mock account".to_string(),
                    currency: Some("USD".to_string()),
                    status: Some(EntityStatus::Active),
                }],
                skipped: 0,
            },
            refreshed: Mutex::new(None),
            fail_with: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_daily(mut self, daily: Vec<DailyMetrics>) -> Self {
        self.daily = daily;
        self
    }

    pub fn with_refresh_result(self, token: RefreshedToken) -> Self {
        *self.refreshed.lock().expect("lock") = Some(token);
        self
    }

    /// Make every subsequent call fail with this error
    pub fn failing_with(self, err: PlatformError) -> Self {
        *self.fail_with.lock().expect("lock") = Some(err);
        self
    }

    /// How many capability calls have reached this adapter
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) -> Result<(), PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.fail_with.lock().expect("lock") {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CampaignQueryable for MockAdapter {
    async fn campaigns(
        &self,
        _session: &AdSession,
        _filter: Option<&EntityFilter>,
        _range: Option<&DateRange>,
    ) -> Result<Paginated<Campaign>, PlatformError> {
        self.record_call()?;
        Ok(Paginated::new(self.campaigns.clone(), false, None))
    }

    async fn ad_groups(
        &self,
        _session: &AdSession,
        _filter: Option<&EntityFilter>,
        _range: Option<&DateRange>,
    ) -> Result<Paginated<AdGroup>, PlatformError> {
        self.record_call()?;
        Ok(Paginated::new(self.ad_groups.clone(), false, None))
    }

    async fn ads(
        &self,
        _session: &AdSession,
        _filter: Option<&EntityFilter>,
        _range: Option<&DateRange>,
    ) -> Result<Paginated<Ad>, PlatformError> {
        self.record_call()?;
        Ok(Paginated::new(self.ads.clone(), false, None))
    }
}

#[async_trait]
impl MetricsQueryable for MockAdapter {
    async fn account_metrics(
        &self,
        _session: &AdSession,
        _range: &DateRange,
    ) -> Result<Metrics, PlatformError> {
        self.record_call()?;
        Ok(self.metrics.clone())
    }

    async fn metrics_by_date(
        &self,
        _session: &AdSession,
        _range: &DateRange,
    ) -> Result<Vec<DailyMetrics>, PlatformError> {
        self.record_call()?;
        Ok(self.daily.clone())
    }
}

#[async_trait]
impl AccountListing for MockAdapter {
    async fn accounts(&self, _session: &AdSession) -> Result<AccountList, PlatformError> {
        self.record_call()?;
        Ok(self.accounts.clone())
    }
}

#[async_trait]
impl TokenRefresher for MockAdapter {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, PlatformError> {
        self.record_call()?;
        self.refreshed
            .lock()
            .expect("lock")
            .clone()
            .ok_or_else(|| PlatformError::Unauthorized("invalid_grant".to_string()))
    }
}
