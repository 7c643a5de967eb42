//! TikTok Business API backend
//!
//! TikTok wraps every response in a `{code, message, data}` envelope and
//! signals business errors with a non-zero `code` even on HTTP 200. Entity
//! listings take a JSON `filtering` query parameter; metrics come from the
//! integrated report endpoint with JSON `dimensions`/`metrics` arrays, and
//! numeric metric values arrive as strings.

use super::AdapterConfig;
use crate::models::{
    AccountList, Ad, AdAccount, AdGroup, AdSession, Campaign, DailyMetrics, DateRange,
    EntityFilter, EntityStatus, Metrics, Paginated, PlatformError, RefreshedToken,
};
use crate::retry::with_retry;
use crate::{AccountListing, CampaignQueryable, MetricsQueryable, TokenRefresher};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

/// TikTok Business API backend
pub struct TikTokBackend {
    client: Client,
    config: AdapterConfig,
}

impl TikTokBackend {
    pub fn new(config: AdapterConfig) -> Self {
        let client = super::build_http_client(config.timeout);
        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url, self.config.api_version, path
        )
    }

    /// GET an envelope-wrapped endpoint with the Access-Token header
    async fn get_enveloped<T: DeserializeOwned>(
        &self,
        session: &AdSession,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, PlatformError> {
        let url = self.endpoint(path);

        with_retry(path, self.config.retry, || {
            let url = url.clone();
            let query = query.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .header("Access-Token", &session.access_token)
                    .query(&query)
                    .send()
                    .await
                    .map_err(|e| PlatformError::Unavailable(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(PlatformError::from_status(status.as_u16(), body));
                }

                let envelope: Envelope<T> = response
                    .json()
                    .await
                    .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;
                envelope.into_data()
            }
        })
        .await
    }

    /// Shared query params for entity listing endpoints
    fn listing_query(
        advertiser_id: &str,
        id_field: &str,
        filter: Option<&EntityFilter>,
    ) -> Vec<(String, String)> {
        let mut query = vec![
            ("advertiser_id".to_string(), advertiser_id.to_string()),
            ("page_size".to_string(), "100".to_string()),
        ];

        let mut filtering = serde_json::Map::new();
        if let Some(filter) = filter {
            if let Some(ids) = &filter.ids {
                if !ids.is_empty() {
                    filtering.insert(id_field.to_string(), serde_json::json!(ids));
                }
            }
            if let Some(status) = &filter.status {
                filtering.insert(
                    "primary_status".to_string(),
                    serde_json::json!(tiktok_status(status)),
                );
            }
        }
        if !filtering.is_empty() {
            query.push((
                "filtering".to_string(),
                serde_json::Value::Object(filtering).to_string(),
            ));
        }
        query
    }

    /// Fetch report rows from the integrated report endpoint
    async fn report(
        &self,
        session: &AdSession,
        range: &DateRange,
        data_level: &str,
        dimensions: &[&str],
    ) -> Result<Vec<ReportRow>, PlatformError> {
        let advertiser_id = session.require_account()?.to_string();
        let query = vec![
            ("advertiser_id".to_string(), advertiser_id),
            ("report_type".to_string(), "BASIC".to_string()),
            ("data_level".to_string(), data_level.to_string()),
            (
                "dimensions".to_string(),
                serde_json::json!(dimensions).to_string(),
            ),
            (
                "metrics".to_string(),
                serde_json::json!([
                    "impressions",
                    "clicks",
                    "spend",
                    "reach",
                    "frequency",
                    "conversion",
                    "total_purchase_value"
                ])
                .to_string(),
            ),
            (
                "start_date".to_string(),
                range.since.format("%Y-%m-%d").to_string(),
            ),
            (
                "end_date".to_string(),
                range.until.format("%Y-%m-%d").to_string(),
            ),
        ];

        let data: ListData<ReportRow> = self
            .get_enveloped(session, "report/integrated/get/", query)
            .await?;
        Ok(data.list)
    }

    /// Per-entity report metrics for a range, keyed by the id dimension
    /// (`campaign_id`, `adgroup_id`, or `ad_id`).
    async fn entity_report(
        &self,
        session: &AdSession,
        range: &DateRange,
        data_level: &str,
        id_dimension: &str,
    ) -> Result<HashMap<String, Metrics>, PlatformError> {
        let rows = self
            .report(session, range, data_level, &[id_dimension])
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let id = row.dimensions.as_ref()?.entity_id(id_dimension)?;
                Some((id, row.normalized()))
            })
            .collect())
    }
}

fn tiktok_status(status: &EntityStatus) -> &str {
    match status {
        EntityStatus::Active => "STATUS_ENABLE",
        EntityStatus::Paused => "STATUS_DISABLE",
        EntityStatus::Deleted | EntityStatus::Archived => "STATUS_DELETE",
        EntityStatus::Other(s) => s.as_str(),
    }
}

fn map_operation_status(status: Option<&str>) -> EntityStatus {
    match status {
        Some("ENABLE") => EntityStatus::Active,
        Some("DISABLE") => EntityStatus::Paused,
        Some("DELETE") => EntityStatus::Deleted,
        Some(other) => EntityStatus::Other(other.to_string()),
        None => EntityStatus::Other("UNKNOWN".to_string()),
    }
}

/// TikTok reports metric values as strings ("1000", "100.00")
fn metric_u64(value: Option<&String>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn metric_f64(value: Option<&String>) -> Option<f64> {
    value.and_then(|v| v.parse().ok())
}

impl ReportRow {
    fn normalized(&self) -> Metrics {
        let m = &self.metrics;
        Metrics::from_base(
            metric_u64(m.impressions.as_ref()),
            metric_u64(m.clicks.as_ref()),
            metric_f64(m.spend.as_ref()).unwrap_or(0.0),
        )
        .with_reach(
            m.reach.as_ref().and_then(|v| v.parse().ok()),
            metric_f64(m.frequency.as_ref()),
        )
        .with_conversions(
            metric_f64(m.conversion.as_ref()),
            metric_f64(m.total_purchase_value.as_ref()),
        )
    }
}

fn into_paginated<T, U>(data: ListData<U>, items: Vec<T>) -> Paginated<T> {
    let (has_more, total) = match &data.page_info {
        Some(info) => (
            info.page.unwrap_or(1) < info.total_page.unwrap_or(1),
            info.total_number,
        ),
        None => (false, None),
    };
    Paginated::new(items, has_more, total)
}

#[async_trait]
impl CampaignQueryable for TikTokBackend {
    async fn campaigns(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Campaign>, PlatformError> {
        let advertiser_id = session.require_account()?;
        let query = Self::listing_query(advertiser_id, "campaign_ids", filter);
        let data: ListData<TikTokCampaign> =
            self.get_enveloped(session, "campaign/get/", query).await?;

        // The listing endpoint carries no metrics; a requested range is
        // answered by a campaign-level report joined on campaign_id.
        let mut metrics_by_id = match range {
            Some(range) => {
                self.entity_report(session, range, "AUCTION_CAMPAIGN", "campaign_id")
                    .await?
            }
            None => HashMap::new(),
        };
        let campaigns = data
            .list
            .iter()
            .map(|c| Campaign {
                id: c.campaign_id.clone(),
                name: c.campaign_name.clone().unwrap_or_default(),
                status: map_operation_status(c.operation_status.as_deref()),
                objective: c.objective_type.clone(),
                daily_budget: c.budget,
                lifetime_budget: None,
                metrics: metrics_by_id.remove(&c.campaign_id),
            })
            .collect();

        Ok(into_paginated(data, campaigns))
    }

    async fn ad_groups(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<AdGroup>, PlatformError> {
        let advertiser_id = session.require_account()?;
        let query = Self::listing_query(advertiser_id, "adgroup_ids", filter);
        let data: ListData<TikTokAdGroup> =
            self.get_enveloped(session, "adgroup/get/", query).await?;

        let mut metrics_by_id = match range {
            Some(range) => {
                self.entity_report(session, range, "AUCTION_ADGROUP", "adgroup_id")
                    .await?
            }
            None => HashMap::new(),
        };
        let ad_groups = data
            .list
            .iter()
            .map(|g| AdGroup {
                id: g.adgroup_id.clone(),
                campaign_id: g.campaign_id.clone().unwrap_or_default(),
                name: g.adgroup_name.clone().unwrap_or_default(),
                status: map_operation_status(g.operation_status.as_deref()),
                bid_amount: g.bid_price,
                metrics: metrics_by_id.remove(&g.adgroup_id),
            })
            .collect();

        Ok(into_paginated(data, ad_groups))
    }

    async fn ads(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Ad>, PlatformError> {
        let advertiser_id = session.require_account()?;
        let query = Self::listing_query(advertiser_id, "ad_ids", filter);
        let data: ListData<TikTokAd> = self.get_enveloped(session, "ad/get/", query).await?;

        let mut metrics_by_id = match range {
            Some(range) => {
                self.entity_report(session, range, "AUCTION_AD", "ad_id")
                    .await?
            }
            None => HashMap::new(),
        };
        let ads = data
            .list
            .iter()
            .map(|a| Ad {
                id: a.ad_id.clone(),
                adgroup_id: a.adgroup_id.clone().unwrap_or_default(),
                campaign_id: a.campaign_id.clone().unwrap_or_default(),
                name: a.ad_name.clone().unwrap_or_default(),
                status: map_operation_status(a.operation_status.as_deref()),
                metrics: metrics_by_id.remove(&a.ad_id),
            })
            .collect();

        Ok(into_paginated(data, ads))
    }
}

#[async_trait]
impl MetricsQueryable for TikTokBackend {
    async fn account_metrics(
        &self,
        session: &AdSession,
        range: &DateRange,
    ) -> Result<Metrics, PlatformError> {
        let rows = self
            .report(session, range, "AUCTION_ADVERTISER", &["advertiser_id"])
            .await?;
        Ok(Metrics::aggregate(rows.iter().map(|r| r.normalized())))
    }

    async fn metrics_by_date(
        &self,
        session: &AdSession,
        range: &DateRange,
    ) -> Result<Vec<DailyMetrics>, PlatformError> {
        let rows = self
            .report(session, range, "AUCTION_ADVERTISER", &["stat_time_day"])
            .await?;

        let mut daily: Vec<DailyMetrics> = rows
            .iter()
            .filter_map(|row| {
                // "2024-01-05 00:00:00" or "2024-01-05"
                let stamp = row.dimensions.as_ref()?.stat_time_day.as_deref()?;
                let date = stamp.split_whitespace().next()?.parse().ok()?;
                Some(DailyMetrics {
                    date,
                    metrics: row.normalized(),
                })
            })
            .collect();
        daily.sort_by_key(|d| d.date);
        Ok(daily)
    }
}

#[async_trait]
impl AccountListing for TikTokBackend {
    /// List advertisers authorized for the token, enriching each with a
    /// detail lookup. One advertiser's failed detail lookup skips only that
    /// advertiser.
    async fn accounts(&self, session: &AdSession) -> Result<AccountList, PlatformError> {
        let query = vec![
            ("app_id".to_string(), self.config.client_id.clone()),
            ("secret".to_string(), self.config.client_secret.clone()),
        ];
        let data: AdvertiserListData = self
            .get_enveloped(session, "oauth2/advertiser/get/", query)
            .await?;

        let mut accounts = Vec::new();
        let mut skipped = 0usize;
        for advertiser in &data.list {
            let detail_query = vec![(
                "advertiser_ids".to_string(),
                serde_json::json!([advertiser.advertiser_id]).to_string(),
            )];
            let detail: Result<ListData<AdvertiserInfo>, _> = self
                .get_enveloped(session, "advertiser/info/", detail_query)
                .await;
            match detail {
                Ok(info) => {
                    let info = info.list.first();
                    accounts.push(AdAccount {
                        id: advertiser.advertiser_id.clone(),
                        name: advertiser
                            .advertiser_name
                            .clone()
                            .or_else(|| info.and_then(|i| i.name.clone()))
                            .unwrap_or_else(|| advertiser.advertiser_id.clone()),
                        currency: info.and_then(|i| i.currency.clone()),
                        status: info
                            .and_then(|i| i.status.as_deref())
                            .map(|s| map_operation_status(Some(s))),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        advertiser_id = %advertiser.advertiser_id,
                        error = %err,
                        "Skipping advertiser, detail lookup failed"
                    );
                    skipped += 1;
                }
            }
        }

        Ok(AccountList { accounts, skipped })
    }
}

#[async_trait]
impl TokenRefresher for TikTokBackend {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, PlatformError> {
        let url = self
            .config
            .token_url
            .clone()
            .unwrap_or_else(|| self.endpoint("oauth2/refresh_token/"));

        let body = serde_json::json!({
            "app_id": self.config.client_id,
            "secret": self.config.client_secret,
            "refresh_token": refresh_token,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(status.as_u16(), body));
        }

        let envelope: Envelope<TikTokTokenData> = response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;
        let token = envelope.into_data()?;

        Ok(RefreshedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            refresh_expires_in: token.refresh_token_expires_in,
        })
    }
}

// ---------------------------------------------------------------------------
// Typed response schemas
// ---------------------------------------------------------------------------

/// Every TikTok response is wrapped in this envelope; `code != 0` is a
/// business error even when the HTTP status is 200
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, PlatformError> {
        match self.code {
            0 => self.data.ok_or_else(|| {
                PlatformError::InvalidResponse("envelope missing data".to_string())
            }),
            // 401xx codes are auth failures (expired/invalid token)
            40100..=40199 => Err(PlatformError::Unauthorized(self.message)),
            _ => Err(PlatformError::BadRequest(self.message)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListData<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    page: Option<u64>,
    total_page: Option<u64>,
    total_number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TikTokCampaign {
    campaign_id: String,
    campaign_name: Option<String>,
    operation_status: Option<String>,
    objective_type: Option<String>,
    budget: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TikTokAdGroup {
    adgroup_id: String,
    adgroup_name: Option<String>,
    campaign_id: Option<String>,
    operation_status: Option<String>,
    bid_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TikTokAd {
    ad_id: String,
    ad_name: Option<String>,
    adgroup_id: Option<String>,
    campaign_id: Option<String>,
    operation_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportRow {
    dimensions: Option<ReportDimensions>,
    metrics: ReportMetrics,
}

#[derive(Debug, Deserialize)]
struct ReportDimensions {
    stat_time_day: Option<String>,
    campaign_id: Option<String>,
    adgroup_id: Option<String>,
    ad_id: Option<String>,
}

impl ReportDimensions {
    fn entity_id(&self, id_dimension: &str) -> Option<String> {
        match id_dimension {
            "campaign_id" => self.campaign_id.clone(),
            "adgroup_id" => self.adgroup_id.clone(),
            "ad_id" => self.ad_id.clone(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReportMetrics {
    impressions: Option<String>,
    clicks: Option<String>,
    spend: Option<String>,
    reach: Option<String>,
    frequency: Option<String>,
    conversion: Option<String>,
    total_purchase_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdvertiserListData {
    #[serde(default = "Vec::new")]
    list: Vec<AdvertiserStub>,
}

#[derive(Debug, Deserialize)]
struct AdvertiserStub {
    advertiser_id: String,
    advertiser_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdvertiserInfo {
    name: Option<String>,
    currency: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TikTokTokenData {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    refresh_token_expires_in: Option<i64>,
}
