//! Platform adapters for external advertising APIs
//!
//! This crate translates one common operation set (list campaigns, ad groups
//! and ads, fetch account metrics) into the native request shape of each
//! supported platform, and normalizes the responses back into a single
//! platform-agnostic data model.
//!
//! # Capability traits
//!
//! There is no shared adapter base type. Each platform backend independently
//! implements the capabilities it supports:
//!
//! - [`CampaignQueryable`] — entity listing (campaigns, ad groups, ads)
//! - [`MetricsQueryable`] — account-level and per-day metrics
//! - [`AccountListing`] — advertiser / ad-account discovery
//! - [`TokenRefresher`] — OAuth token refresh for the platform
//!
//! Callers hold the backends as trait objects and never see a platform's raw
//! response shape; parsing happens once, at the adapter boundary, into the
//! typed schemas each backend defines privately.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ad_platforms::{external::GoogleAdsBackend, AdSession, DateRange, MetricsQueryable};
//!
//! async fn example(backend: GoogleAdsBackend, session: AdSession) {
//!     let range = DateRange::new("2024-01-01".parse().unwrap(), "2024-01-31".parse().unwrap());
//!     let metrics = backend.account_metrics(&session, &range).await.unwrap();
//!     println!("spend: {} ctr: {}", metrics.spend, metrics.ctr);
//! }
//! ```

pub mod external;
pub mod mock;
pub mod models;
pub mod retry;

use async_trait::async_trait;
use models::*;

// Re-export commonly used types for convenience
pub use external::{AdapterConfig, FacebookBackend, GoogleAdsBackend, TikTokBackend};
pub use mock::MockAdapter;
pub use models::{
    AccountList, Ad, AdAccount, AdGroup, AdSession, Campaign, DailyMetrics, DateRange,
    EntityFilter, EntityStatus, Metrics, Paginated, Platform, PlatformError, RefreshedToken,
};
pub use retry::RetryPolicy;

/// Entity listing capability
///
/// Every call requires a session with a valid access token and a selected
/// external account id, and fails with [`PlatformError::Unauthorized`]
/// otherwise. An optional filter narrows by entity id, and an optional date
/// range attaches normalized metrics to each returned row.
#[async_trait]
pub trait CampaignQueryable: Send + Sync {
    async fn campaigns(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Campaign>, PlatformError>;

    async fn ad_groups(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<AdGroup>, PlatformError>;

    async fn ads(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Ad>, PlatformError>;
}

/// Metrics fetching capability
#[async_trait]
pub trait MetricsQueryable: Send + Sync {
    /// Aggregate metrics for the whole ad account over the date range
    async fn account_metrics(
        &self,
        session: &AdSession,
        range: &DateRange,
    ) -> Result<Metrics, PlatformError>;

    /// One metrics row per day in the date range
    async fn metrics_by_date(
        &self,
        session: &AdSession,
        range: &DateRange,
    ) -> Result<Vec<DailyMetrics>, PlatformError>;
}

/// Advertiser / ad-account discovery capability
///
/// A failed per-account detail lookup never aborts the listing; the item is
/// omitted, a warning is logged, and the returned [`AccountList`] carries the
/// number of skipped accounts.
#[async_trait]
pub trait AccountListing: Send + Sync {
    async fn accounts(&self, session: &AdSession) -> Result<AccountList, PlatformError>;
}

/// OAuth token refresh capability
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange the stored refresh token for a fresh access token.
    ///
    /// Facebook has no separate refresh token; its backend treats the passed
    /// value as the current long-lived token and re-exchanges it.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, PlatformError>;
}
