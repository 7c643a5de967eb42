//! Facebook Marketing API backend
//!
//! Graph API GETs with a comma-joined `fields` selector and the access
//! token passed as a query parameter. Numeric insight values arrive as
//! strings. Facebook has no refresh token; "refreshing" re-exchanges the
//! current long-lived token.

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

/// Facebook Marketing API backend
pub struct FacebookBackend {
    client: Client,
    config: AdapterConfig,
}

impl FacebookBackend {
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

    /// GET a Graph edge, surfacing Facebook's error message on failure
    async fn get_edge<T: DeserializeOwned>(
        &self,
        session: &AdSession,
        path: &str,
        mut query: Vec<(String, String)>,
    ) -> Result<T, PlatformError> {
        let url = self.endpoint(path);
        query.push(("access_token".to_string(), session.access_token.clone()));

        with_retry(path, self.config.retry, || {
            let url = url.clone();
            let query = query.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .query(&query)
                    .send()
                    .await
                    .map_err(|e| PlatformError::Unavailable(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(PlatformError::from_status(
                        status.as_u16(),
                        extract_error_message(&body),
                    ));
                }

                response
                    .json::<T>()
                    .await
                    .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
            }
        })
        .await
    }

    /// Listing query: fields selector plus optional id filtering
    fn listing_query(fields: &[&str], filter: Option<&EntityFilter>) -> Vec<(String, String)> {
        let mut query = vec![
            ("fields".to_string(), fields.join(",")),
            ("limit".to_string(), "100".to_string()),
        ];
        if let Some(filter) = filter {
            if let Some(ids) = &filter.ids {
                if !ids.is_empty() {
                    let clause = serde_json::json!([{
                        "field": "id",
                        "operator": "IN",
                        "value": ids,
                    }]);
                    query.push(("filtering".to_string(), clause.to_string()));
                }
            }
            if let Some(status) = &filter.status {
                query.push((
                    "effective_status".to_string(),
                    serde_json::json!([facebook_status(status)]).to_string(),
                ));
            }
        }
        query
    }

    async fn insights(
        &self,
        session: &AdSession,
        range: &DateRange,
        daily: bool,
    ) -> Result<Vec<InsightRow>, PlatformError> {
        let account_id = session.require_account()?;
        let path = format!("act_{account_id}/insights");
        let mut query = vec![
            (
                "fields".to_string(),
                "impressions,clicks,spend,reach,frequency,date_start".to_string(),
            ),
            (
                "time_range".to_string(),
                serde_json::json!({
                    "since": range.since.format("%Y-%m-%d").to_string(),
                    "until": range.until.format("%Y-%m-%d").to_string(),
                })
                .to_string(),
            ),
        ];
        if daily {
            query.push(("time_increment".to_string(), "1".to_string()));
        }

        let page: GraphPage<InsightRow> = self.get_edge(session, &path, query).await?;
        Ok(page.data)
    }

    /// Per-entity insights for a range, keyed by entity id.
    ///
    /// `level` is one of `campaign`/`adset`/`ad`; the matching `{level}_id`
    /// field joins each insight row back to its listing row.
    async fn entity_insights(
        &self,
        session: &AdSession,
        range: &DateRange,
        level: &str,
    ) -> Result<HashMap<String, Metrics>, PlatformError> {
        let account_id = session.require_account()?;
        let path = format!("act_{account_id}/insights");
        let query = vec![
            (
                "fields".to_string(),
                format!("{level}_id,impressions,clicks,spend,reach,frequency"),
            ),
            ("level".to_string(), level.to_string()),
            (
                "time_range".to_string(),
                serde_json::json!({
                    "since": range.since.format("%Y-%m-%d").to_string(),
                    "until": range.until.format("%Y-%m-%d").to_string(),
                })
                .to_string(),
            ),
            ("limit".to_string(), "100".to_string()),
        ];

        let page: GraphPage<InsightRow> = self.get_edge(session, &path, query).await?;
        Ok(page
            .data
            .iter()
            .filter_map(|row| Some((row.entity_id(level)?, row.normalized())))
            .collect())
    }
}

fn facebook_status(status: &EntityStatus) -> &str {
    match status {
        EntityStatus::Active => "ACTIVE",
        EntityStatus::Paused => "PAUSED",
        EntityStatus::Deleted => "DELETED",
        EntityStatus::Archived => "ARCHIVED",
        EntityStatus::Other(s) => s.as_str(),
    }
}

fn map_status(status: Option<&str>) -> EntityStatus {
    match status {
        Some("ACTIVE") => EntityStatus::Active,
        Some("PAUSED") => EntityStatus::Paused,
        Some("DELETED") => EntityStatus::Deleted,
        Some("ARCHIVED") => EntityStatus::Archived,
        Some(other) => EntityStatus::Other(other.to_string()),
        None => EntityStatus::Other("UNKNOWN".to_string()),
    }
}

/// Graph numeric fields arrive as strings ("1000", "100.00")
fn field_u64(value: Option<&String>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn field_f64(value: Option<&String>) -> Option<f64> {
    value.and_then(|v| v.parse().ok())
}

fn extract_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

impl InsightRow {
    fn entity_id(&self, level: &str) -> Option<String> {
        match level {
            "campaign" => self.campaign_id.clone(),
            "adset" => self.adset_id.clone(),
            "ad" => self.ad_id.clone(),
            _ => None,
        }
    }

    fn normalized(&self) -> Metrics {
        Metrics::from_base(
            field_u64(self.impressions.as_ref()),
            field_u64(self.clicks.as_ref()),
            field_f64(self.spend.as_ref()).unwrap_or(0.0),
        )
        .with_reach(
            self.reach.as_ref().and_then(|v| v.parse().ok()),
            field_f64(self.frequency.as_ref()),
        )
    }
}

fn into_paginated<T, U>(page: GraphPage<U>, items: Vec<T>) -> Paginated<T> {
    let has_more = page
        .paging
        .as_ref()
        .map(|p| p.next.is_some())
        .unwrap_or(false);
    // Graph paging carries cursors, not totals
    Paginated::new(items, has_more, None)
}

#[async_trait]
impl CampaignQueryable for FacebookBackend {
    async fn campaigns(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Campaign>, PlatformError> {
        let account_id = session.require_account()?;
        let path = format!("act_{account_id}/campaigns");
        let query = Self::listing_query(
            &[
                "id",
                "name",
                "status",
                "objective",
                "daily_budget",
                "lifetime_budget",
            ],
            filter,
        );

        let page: GraphPage<FacebookCampaign> = self.get_edge(session, &path, query).await?;
        let mut metrics_by_id = match range {
            Some(range) => self.entity_insights(session, range, "campaign").await?,
            None => HashMap::new(),
        };
        let campaigns = page
            .data
            .iter()
            .map(|c| Campaign {
                id: c.id.clone(),
                name: c.name.clone().unwrap_or_default(),
                status: map_status(c.status.as_deref()),
                objective: c.objective.clone(),
                daily_budget: field_f64(c.daily_budget.as_ref()),
                lifetime_budget: field_f64(c.lifetime_budget.as_ref()),
                metrics: metrics_by_id.remove(&c.id),
            })
            .collect();

        Ok(into_paginated(page, campaigns))
    }

    async fn ad_groups(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<AdGroup>, PlatformError> {
        let account_id = session.require_account()?;
        let path = format!("act_{account_id}/adsets");
        let query = Self::listing_query(
            &["id", "name", "status", "campaign_id", "bid_amount"],
            filter,
        );

        let page: GraphPage<FacebookAdSet> = self.get_edge(session, &path, query).await?;
        let mut metrics_by_id = match range {
            Some(range) => self.entity_insights(session, range, "adset").await?,
            None => HashMap::new(),
        };
        let ad_groups = page
            .data
            .iter()
            .map(|s| AdGroup {
                id: s.id.clone(),
                campaign_id: s.campaign_id.clone().unwrap_or_default(),
                name: s.name.clone().unwrap_or_default(),
                status: map_status(s.status.as_deref()),
                bid_amount: field_f64(s.bid_amount.as_ref()),
                metrics: metrics_by_id.remove(&s.id),
            })
            .collect();

        Ok(into_paginated(page, ad_groups))
    }

    async fn ads(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Ad>, PlatformError> {
        let account_id = session.require_account()?;
        let path = format!("act_{account_id}/ads");
        let query = Self::listing_query(
            &["id", "name", "status", "adset_id", "campaign_id"],
            filter,
        );

        let page: GraphPage<FacebookAd> = self.get_edge(session, &path, query).await?;
        let mut metrics_by_id = match range {
            Some(range) => self.entity_insights(session, range, "ad").await?,
            None => HashMap::new(),
        };
        let ads = page
            .data
            .iter()
            .map(|a| Ad {
                id: a.id.clone(),
                adgroup_id: a.adset_id.clone().unwrap_or_default(),
                campaign_id: a.campaign_id.clone().unwrap_or_default(),
                name: a.name.clone().unwrap_or_default(),
                status: map_status(a.status.as_deref()),
                metrics: metrics_by_id.remove(&a.id),
            })
            .collect();

        Ok(into_paginated(page, ads))
    }
}

#[async_trait]
impl MetricsQueryable for FacebookBackend {
    async fn account_metrics(
        &self,
        session: &AdSession,
        range: &DateRange,
    ) -> Result<Metrics, PlatformError> {
        let rows = self.insights(session, range, false).await?;
        Ok(Metrics::aggregate(rows.iter().map(|r| r.normalized())))
    }

    async fn metrics_by_date(
        &self,
        session: &AdSession,
        range: &DateRange,
    ) -> Result<Vec<DailyMetrics>, PlatformError> {
        let rows = self.insights(session, range, true).await?;

        let mut daily: Vec<DailyMetrics> = rows
            .iter()
            .filter_map(|row| {
                let date = row.date_start.as_deref()?.parse().ok()?;
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
impl AccountListing for FacebookBackend {
    async fn accounts(&self, session: &AdSession) -> Result<AccountList, PlatformError> {
        let query = vec![(
            "fields".to_string(),
            "id,account_id,name,currency,account_status".to_string(),
        )];
        let page: GraphPage<FacebookAdAccount> =
            self.get_edge(session, "me/adaccounts", query).await?;

        let mut accounts = Vec::new();
        let mut skipped = 0usize;
        for account in &page.data {
            // account_id is the bare numeric id; id is the "act_…" form
            let Some(id) = account
                .account_id
                .clone()
                .or_else(|| account.id.strip_prefix("act_").map(str::to_string))
            else {
                tracing::warn!(raw_id = %account.id, "Skipping ad account with unusable id");
                skipped += 1;
                continue;
            };
            accounts.push(AdAccount {
                id,
                name: account.name.clone().unwrap_or_default(),
                currency: account.currency.clone(),
                // 1 = active, everything else is some flavor of disabled
                status: account.account_status.map(|s| {
                    if s == 1 {
                        EntityStatus::Active
                    } else {
                        EntityStatus::Other(s.to_string())
                    }
                }),
            });
        }

        Ok(AccountList { accounts, skipped })
    }
}

#[async_trait]
impl TokenRefresher for FacebookBackend {
    /// Re-exchange the current long-lived token for a new one.
    ///
    /// Facebook issues no refresh token; callers pass the token they hold.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, PlatformError> {
        let url = self
            .config
            .token_url
            .clone()
            .unwrap_or_else(|| self.endpoint("oauth/access_token"));

        let response = self
            .client
            .get(&url)
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("fb_exchange_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(
                status.as_u16(),
                extract_error_message(&body),
            ));
        }

        let token: FacebookTokenResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;

        Ok(RefreshedToken {
            refresh_token: Some(token.access_token.clone()),
            access_token: token.access_token,
            expires_in: token.expires_in,
            refresh_expires_in: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Typed response schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    paging: Option<GraphPaging>,
}

#[derive(Debug, Deserialize)]
struct GraphPaging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookCampaign {
    id: String,
    name: Option<String>,
    status: Option<String>,
    objective: Option<String>,
    daily_budget: Option<String>,
    lifetime_budget: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookAdSet {
    id: String,
    name: Option<String>,
    status: Option<String>,
    campaign_id: Option<String>,
    bid_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookAd {
    id: String,
    name: Option<String>,
    status: Option<String>,
    adset_id: Option<String>,
    campaign_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookAdAccount {
    id: String,
    account_id: Option<String>,
    name: Option<String>,
    currency: Option<String>,
    account_status: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct InsightRow {
    campaign_id: Option<String>,
    adset_id: Option<String>,
    ad_id: Option<String>,
    impressions: Option<String>,
    clicks: Option<String>,
    spend: Option<String>,
    reach: Option<String>,
    frequency: Option<String>,
    date_start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}
