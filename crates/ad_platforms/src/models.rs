//! Platform-agnostic data model shared by all adapters
//!
//! Everything a platform returns is normalized into these types before it
//! leaves the adapter boundary. Derived ratios are always computed with the
//! zero-safe [`ratio`] helper so a zero denominator yields 0.0 rather than
//! NaN or infinity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported advertising platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    TikTok,
    Google,
}

impl Platform {
    /// Database / cache-key string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::TikTok => "tiktok",
            Platform::Google => "google",
        }
    }

    /// Parse from the database string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "facebook" => Some(Platform::Facebook),
            "tiktok" => Some(Platform::TikTok),
            "google" => Some(Platform::Google),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    pub fn new(since: NaiveDate, until: NaiveDate) -> Self {
        Self { since, until }
    }

    /// Cache-key fragment, e.g. "2024-01-01_2024-01-31".
    ///
    /// Distinct ranges must never collide in the metrics cache, so the full
    /// ISO dates go into the key.
    pub fn cache_fragment(&self) -> String {
        format!(
            "{}_{}",
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )
    }
}

/// Zero-safe division: 0.0 whenever the denominator is 0
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Google reports monetary values in micros (1/1,000,000 currency units)
pub fn micros_to_currency(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Normalized performance metrics with derived ratios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metrics {
    pub impressions: u64,
    pub clicks: u64,
    /// Spend in the account currency, already past the per-platform
    /// normalization boundary (micros divided out for Google)
    pub spend: f64,
    pub reach: Option<u64>,
    pub frequency: Option<f64>,
    pub conversions: Option<f64>,
    pub conversion_value: Option<f64>,
    /// clicks / impressions * 100
    pub ctr: f64,
    /// spend / clicks
    pub cpc: f64,
    /// spend / impressions * 1000
    pub cpm: f64,
    /// conversion_value / spend
    pub roas: f64,
    /// spend / conversions
    pub cost_per_conversion: f64,
}

impl Metrics {
    /// Build metrics from base counters and compute every derived ratio
    pub fn from_base(impressions: u64, clicks: u64, spend: f64) -> Self {
        let mut m = Self {
            impressions,
            clicks,
            spend,
            ..Default::default()
        };
        m.recompute_derived();
        m
    }

    pub fn with_reach(mut self, reach: Option<u64>, frequency: Option<f64>) -> Self {
        self.reach = reach;
        self.frequency = frequency;
        self
    }

    pub fn with_conversions(
        mut self,
        conversions: Option<f64>,
        conversion_value: Option<f64>,
    ) -> Self {
        self.conversions = conversions;
        self.conversion_value = conversion_value;
        self.recompute_derived();
        self
    }

    /// Recompute every derived ratio from the base counters
    pub fn recompute_derived(&mut self) {
        self.ctr = ratio(self.clicks as f64, self.impressions as f64) * 100.0;
        self.cpc = ratio(self.spend, self.clicks as f64);
        self.cpm = ratio(self.spend, self.impressions as f64) * 1000.0;
        self.roas = ratio(self.conversion_value.unwrap_or(0.0), self.spend);
        self.cost_per_conversion = ratio(self.spend, self.conversions.unwrap_or(0.0));
    }

    /// Sum a sequence of metrics rows into one aggregate, re-deriving ratios.
    ///
    /// Reach is not summable across rows (the same user can be reached on
    /// several days), so it is only kept when a single row is aggregated.
    pub fn aggregate<I: IntoIterator<Item = Metrics>>(rows: I) -> Self {
        let mut total = Metrics::default();
        let mut count = 0usize;
        let mut single_reach = None;
        let mut single_frequency = None;
        for row in rows {
            total.impressions += row.impressions;
            total.clicks += row.clicks;
            total.spend += row.spend;
            if let Some(c) = row.conversions {
                *total.conversions.get_or_insert(0.0) += c;
            }
            if let Some(v) = row.conversion_value {
                *total.conversion_value.get_or_insert(0.0) += v;
            }
            single_reach = row.reach;
            single_frequency = row.frequency;
            count += 1;
        }
        if count == 1 {
            total.reach = single_reach;
            total.frequency = single_frequency;
        }
        total.recompute_derived();
        total
    }
}

/// Normalized entity status across platforms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Paused,
    Deleted,
    Archived,
    /// Unmapped platform status - keeps the original value
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: EntityStatus,
    pub objective: Option<String>,
    pub daily_budget: Option<f64>,
    pub lifetime_budget: Option<f64>,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdGroup {
    pub id: String,
    pub campaign_id: String,
    pub name: String,
    pub status: EntityStatus,
    pub bid_amount: Option<f64>,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub adgroup_id: String,
    pub campaign_id: String,
    pub name: String,
    pub status: EntityStatus,
    pub metrics: Option<Metrics>,
}

/// One external ad account reachable with a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdAccount {
    pub id: String,
    pub name: String,
    pub currency: Option<String>,
    pub status: Option<EntityStatus>,
}

/// Account listing result with a partial-failure count.
///
/// A failed per-account detail lookup omits that account instead of failing
/// the whole listing; `skipped` says how many were dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountList {
    pub accounts: Vec<AdAccount>,
    pub skipped: usize,
}

/// Metrics for a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub metrics: Metrics,
}

/// Paginated response envelope.
///
/// Adapters surface whatever one platform call returns; nothing
/// auto-paginates past a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub total_count: Option<u64>,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, has_more: bool, total_count: Option<u64>) -> Self {
        Self {
            items,
            has_more,
            total_count,
        }
    }
}

/// Optional narrowing of an entity listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Restrict to these entity ids
    pub ids: Option<Vec<String>>,
    /// Restrict to entities with this normalized status
    pub status: Option<EntityStatus>,
}

/// Credentials an adapter needs to call a platform on a user's behalf.
///
/// Built by the session layer from a stored, non-expired session; adapters
/// never see session storage.
#[derive(Debug, Clone)]
pub struct AdSession {
    pub access_token: String,
    /// Selected external ad account (customer id, advertiser id, act id)
    pub account_id: Option<String>,
}

impl AdSession {
    pub fn new(access_token: impl Into<String>, account_id: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            account_id,
        }
    }

    /// The selected account id, or Unauthorized when none was chosen
    pub fn require_account(&self) -> Result<&str, PlatformError> {
        self.account_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlatformError::Unauthorized("no ad account selected".to_string()))
    }
}

/// Rotated credentials returned by a token refresh
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds until the new access token expires
    pub expires_in: Option<i64>,
    /// Seconds until the new refresh token expires (platform-dependent)
    pub refresh_expires_in: Option<i64>,
}

/// Adapter error taxonomy
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// Missing/invalid credentials, or the platform returned 401
    #[error("Not authenticated: {0}")]
    Unauthorized(String),
    /// The platform rejected the request with a business-rule 4xx
    #[error("Platform rejected the request: {0}")]
    BadRequest(String),
    /// Network failure or 5xx from the platform
    #[error("Platform unavailable: {0}")]
    Unavailable(String),
    /// The platform answered with a shape we could not parse
    #[error("Invalid platform response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    /// Map a non-success HTTP status plus body text onto the taxonomy
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => PlatformError::Unauthorized(message),
            400..=499 => PlatformError::BadRequest(message),
            _ => PlatformError::Unavailable(format!("status {status}: {message}")),
        }
    }

    /// Transient errors are the only ones worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, PlatformError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("valid date")
    }

    #[test]
    fn derived_ratios_are_zero_safe() {
        let m = Metrics::from_base(0, 0, 0.0);
        assert_eq!(m.ctr, 0.0);
        assert_eq!(m.cpc, 0.0);
        assert_eq!(m.cpm, 0.0);
        assert_eq!(m.roas, 0.0);
        assert_eq!(m.cost_per_conversion, 0.0);

        // No NaN leaks through serialization either
        let json = serde_json::to_string(&m).expect("serialize");
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn derived_ratios_match_formulas() {
        let m = Metrics::from_base(1000, 50, 100.0).with_conversions(Some(4.0), Some(300.0));
        assert_eq!(m.ctr, 5.0);
        assert_eq!(m.cpc, 2.0);
        assert_eq!(m.cpm, 100.0);
        assert_eq!(m.roas, 3.0);
        assert_eq!(m.cost_per_conversion, 25.0);
    }

    #[test]
    fn roas_is_zero_without_spend() {
        let m = Metrics::from_base(10, 1, 0.0).with_conversions(Some(1.0), Some(50.0));
        assert_eq!(m.roas, 0.0);
        assert_eq!(m.cost_per_conversion, 0.0);
    }

    #[test]
    fn micros_normalization() {
        assert_eq!(micros_to_currency(100_000_000), 100.0);
        assert_eq!(micros_to_currency(0), 0.0);
        assert_eq!(micros_to_currency(1_500_000), 1.5);
    }

    #[test]
    fn aggregate_sums_and_rederives() {
        let rows = vec![
            Metrics::from_base(500, 20, 40.0).with_conversions(Some(1.0), Some(10.0)),
            Metrics::from_base(500, 30, 60.0).with_conversions(Some(3.0), Some(90.0)),
        ];
        let total = Metrics::aggregate(rows);
        assert_eq!(total.impressions, 1000);
        assert_eq!(total.clicks, 50);
        assert_eq!(total.spend, 100.0);
        assert_eq!(total.ctr, 5.0);
        assert_eq!(total.cpc, 2.0);
        assert_eq!(total.conversions, Some(4.0));
        assert_eq!(total.conversion_value, Some(100.0));
        assert_eq!(total.roas, 1.0);
        // Reach does not survive multi-row aggregation
        assert_eq!(total.reach, None);
    }

    #[test]
    fn date_range_cache_fragment() {
        let range = DateRange::new(date("2024-01-01"), date("2024-01-31"));
        assert_eq!(range.cache_fragment(), "2024-01-01_2024-01-31");
    }

    #[test]
    fn session_requires_selected_account() {
        let without = AdSession::new("token", None);
        assert!(matches!(
            without.require_account(),
            Err(PlatformError::Unauthorized(_))
        ));

        let with = AdSession::new("token", Some("act_123".to_string()));
        assert_eq!(with.require_account().expect("account"), "act_123");
    }

    #[test]
    fn status_mapping_from_http() {
        assert!(matches!(
            PlatformError::from_status(401, "bad token".into()),
            PlatformError::Unauthorized(_)
        ));
        assert!(matches!(
            PlatformError::from_status(400, "invalid campaign id".into()),
            PlatformError::BadRequest(_)
        ));
        assert!(PlatformError::from_status(503, "overloaded".into()).is_transient());
    }
}
