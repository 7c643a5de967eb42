//! Google Ads backend
//!
//! Queries are GAQL strings POSTed to the `googleAds:search` endpoint.
//! Google reports every monetary value in micros and serializes int64
//! metrics as JSON strings; both are normalized here before anything
//! leaves the adapter.

use super::AdapterConfig;
use crate::models::{
    micros_to_currency, AccountList, Ad, AdAccount, AdGroup, AdSession, Campaign, DailyMetrics,
    DateRange, EntityFilter, EntityStatus, Metrics, Paginated, PlatformError, RefreshedToken,
};
use crate::retry::with_retry;
use crate::{AccountListing, CampaignQueryable, MetricsQueryable, TokenRefresher};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const METRIC_FIELDS: &[&str] = &[
    "metrics.impressions",
    "metrics.clicks",
    "metrics.cost_micros",
    "metrics.conversions",
    "metrics.conversions_value",
];

/// Google Ads backend - GAQL over the REST search endpoint
pub struct GoogleAdsBackend {
    client: Client,
    config: AdapterConfig,
}

impl GoogleAdsBackend {
    pub fn new(config: AdapterConfig) -> Self {
        let client = super::build_http_client(config.timeout);
        Self { client, config }
    }

    fn token_endpoint(&self) -> String {
        self.config
            .token_url
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string())
    }

    fn build_headers(&self, access_token: &str) -> Result<HeaderMap, PlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|e| PlatformError::Unauthorized(format!("invalid access token: {e}")))?;
        headers.insert("Authorization", bearer);

        let developer_token = self.config.developer_token.as_deref().ok_or_else(|| {
            PlatformError::BadRequest("Google Ads developer token not configured".to_string())
        })?;
        let dev = HeaderValue::from_str(developer_token)
            .map_err(|e| PlatformError::BadRequest(format!("invalid developer token: {e}")))?;
        headers.insert("developer-token", dev);

        if let Some(login_customer_id) = &self.config.login_customer_id {
            if let Ok(value) = HeaderValue::from_str(login_customer_id) {
                headers.insert("login-customer-id", value);
            }
        }

        Ok(headers)
    }

    /// POST one GAQL query and parse the typed search response
    async fn search(
        &self,
        session: &AdSession,
        query: String,
    ) -> Result<SearchResponse, PlatformError> {
        let customer_id = session.require_account()?.to_string();
        let url = format!(
            "{}/{}/customers/{}/googleAds:search",
            self.config.base_url, self.config.api_version, customer_id
        );
        let headers = self.build_headers(&session.access_token)?;

        tracing::debug!(customer_id = %customer_id, "Executing GAQL search");

        with_retry("google_ads.search", self.config.retry, || {
            let url = url.clone();
            let headers = headers.clone();
            let body = serde_json::json!({ "query": query });
            async move {
                let response = self
                    .client
                    .post(&url)
                    .headers(headers)
                    .json(&body)
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
                    .json::<SearchResponse>()
                    .await
                    .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
            }
        })
        .await
    }
}

/// Assemble a GAQL `SELECT ... FROM ... WHERE ...` string
fn gaql(select: &[&str], from: &str, conditions: &[String], order_by: Option<&str>) -> String {
    let mut query = format!("SELECT {} FROM {from}", select.join(", "));
    if !conditions.is_empty() {
        query.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
    }
    if let Some(order) = order_by {
        query.push_str(&format!(" ORDER BY {order}"));
    }
    query
}

fn date_condition(range: &DateRange) -> String {
    format!(
        "segments.date BETWEEN '{}' AND '{}'",
        range.since.format("%Y-%m-%d"),
        range.until.format("%Y-%m-%d")
    )
}

/// Conditions contributed by an entity filter.
///
/// The id and status fields differ per resource (ads select
/// `ad_group_ad.ad.id` but carry their status on `ad_group_ad.status`), so
/// both are passed explicitly. Filter values are spliced into the GAQL
/// string, so ids must be numeric and statuses enum-shaped; anything else
/// is rejected before a query is built.
fn filter_conditions(
    id_field: &str,
    status_field: &str,
    filter: Option<&EntityFilter>,
) -> Result<Vec<String>, PlatformError> {
    let mut conditions = Vec::new();
    if let Some(filter) = filter {
        if let Some(ids) = &filter.ids {
            if !ids.is_empty() {
                for id in ids {
                    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(PlatformError::BadRequest(format!(
                            "invalid Google Ads entity id: {id}"
                        )));
                    }
                }
                conditions.push(format!("{id_field} IN ({})", ids.join(", ")));
            }
        }
        if let Some(status) = &filter.status {
            let value = google_status(status);
            if value.is_empty()
                || !value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
            {
                return Err(PlatformError::BadRequest(format!(
                    "invalid status filter: {value}"
                )));
            }
            conditions.push(format!("{status_field} = '{value}'"));
        }
    }
    Ok(conditions)
}

fn google_status(status: &EntityStatus) -> &str {
    match status {
        EntityStatus::Active => "ENABLED",
        EntityStatus::Paused => "PAUSED",
        EntityStatus::Deleted | EntityStatus::Archived => "REMOVED",
        EntityStatus::Other(s) => s.as_str(),
    }
}

fn map_status(status: Option<&str>) -> EntityStatus {
    match status {
        Some("ENABLED") => EntityStatus::Active,
        Some("PAUSED") => EntityStatus::Paused,
        Some("REMOVED") => EntityStatus::Deleted,
        Some(other) => EntityStatus::Other(other.to_string()),
        None => EntityStatus::Other("UNKNOWN".to_string()),
    }
}

/// Google serializes int64 fields as JSON strings
fn parse_count(value: Option<&String>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn parse_micros(value: Option<&String>) -> Option<f64> {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .map(micros_to_currency)
}

/// Pull the human-readable message out of a Google error body, if present
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

impl SearchRow {
    fn normalized_metrics(&self) -> Option<Metrics> {
        self.metrics.as_ref().map(|m| {
            Metrics::from_base(
                parse_count(m.impressions.as_ref()),
                parse_count(m.clicks.as_ref()),
                parse_micros(m.cost_micros.as_ref()).unwrap_or(0.0),
            )
            .with_conversions(m.conversions, m.conversions_value)
        })
    }
}

impl SearchResponse {
    fn into_paginated<T>(self, items: Vec<T>) -> Paginated<T> {
        let total_count = self.total_results_count.as_ref().and_then(|c| c.parse().ok());
        Paginated::new(items, self.next_page_token.is_some(), total_count)
    }
}

#[async_trait]
impl CampaignQueryable for GoogleAdsBackend {
    async fn campaigns(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Campaign>, PlatformError> {
        let mut select = vec![
            "campaign.id",
            "campaign.name",
            "campaign.status",
            "campaign.advertising_channel_type",
            "campaign_budget.amount_micros",
        ];
        let mut conditions = filter_conditions("campaign.id", "campaign.status", filter)?;
        if let Some(range) = range {
            select.extend_from_slice(METRIC_FIELDS);
            conditions.push(date_condition(range));
        }

        let response = self
            .search(session, gaql(&select, "campaign", &conditions, None))
            .await?;

        let campaigns = response
            .results
            .iter()
            .filter_map(|row| {
                let campaign = row.campaign.as_ref()?;
                Some(Campaign {
                    id: campaign.id.clone()?,
                    name: campaign.name.clone().unwrap_or_default(),
                    status: map_status(campaign.status.as_deref()),
                    objective: campaign.advertising_channel_type.clone(),
                    daily_budget: row
                        .campaign_budget
                        .as_ref()
                        .and_then(|b| parse_micros(b.amount_micros.as_ref())),
                    lifetime_budget: None,
                    metrics: row.normalized_metrics(),
                })
            })
            .collect();

        Ok(response.into_paginated(campaigns))
    }

    async fn ad_groups(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<AdGroup>, PlatformError> {
        let mut select = vec![
            "ad_group.id",
            "ad_group.name",
            "ad_group.status",
            "ad_group.cpc_bid_micros",
            "campaign.id",
        ];
        let mut conditions = filter_conditions("ad_group.id", "ad_group.status", filter)?;
        if let Some(range) = range {
            select.extend_from_slice(METRIC_FIELDS);
            conditions.push(date_condition(range));
        }

        let response = self
            .search(session, gaql(&select, "ad_group", &conditions, None))
            .await?;

        let ad_groups = response
            .results
            .iter()
            .filter_map(|row| {
                let ad_group = row.ad_group.as_ref()?;
                Some(AdGroup {
                    id: ad_group.id.clone()?,
                    campaign_id: row
                        .campaign
                        .as_ref()
                        .and_then(|c| c.id.clone())
                        .unwrap_or_default(),
                    name: ad_group.name.clone().unwrap_or_default(),
                    status: map_status(ad_group.status.as_deref()),
                    bid_amount: parse_micros(ad_group.cpc_bid_micros.as_ref()),
                    metrics: row.normalized_metrics(),
                })
            })
            .collect();

        Ok(response.into_paginated(ad_groups))
    }

    async fn ads(
        &self,
        session: &AdSession,
        filter: Option<&EntityFilter>,
        range: Option<&DateRange>,
    ) -> Result<Paginated<Ad>, PlatformError> {
        let mut select = vec![
            "ad_group_ad.ad.id",
            "ad_group_ad.ad.name",
            "ad_group_ad.status",
            "ad_group.id",
            "campaign.id",
        ];
        let mut conditions = filter_conditions("ad_group_ad.ad.id", "ad_group_ad.status", filter)?;
        if let Some(range) = range {
            select.extend_from_slice(METRIC_FIELDS);
            conditions.push(date_condition(range));
        }

        let response = self
            .search(session, gaql(&select, "ad_group_ad", &conditions, None))
            .await?;

        let ads = response
            .results
            .iter()
            .filter_map(|row| {
                let ad_group_ad = row.ad_group_ad.as_ref()?;
                let ad = ad_group_ad.ad.as_ref()?;
                Some(Ad {
                    id: ad.id.clone()?,
                    adgroup_id: row
                        .ad_group
                        .as_ref()
                        .and_then(|g| g.id.clone())
                        .unwrap_or_default(),
                    campaign_id: row
                        .campaign
                        .as_ref()
                        .and_then(|c| c.id.clone())
                        .unwrap_or_default(),
                    name: ad.name.clone().unwrap_or_default(),
                    status: map_status(ad_group_ad.status.as_deref()),
                    metrics: row.normalized_metrics(),
                })
            })
            .collect();

        Ok(response.into_paginated(ads))
    }
}

#[async_trait]
impl MetricsQueryable for GoogleAdsBackend {
    async fn account_metrics(
        &self,
        session: &AdSession,
        range: &DateRange,
    ) -> Result<Metrics, PlatformError> {
        let conditions = vec![date_condition(range)];
        let response = self
            .search(session, gaql(METRIC_FIELDS, "customer", &conditions, None))
            .await?;

        Ok(Metrics::aggregate(
            response
                .results
                .iter()
                .filter_map(|row| row.normalized_metrics()),
        ))
    }

    async fn metrics_by_date(
        &self,
        session: &AdSession,
        range: &DateRange,
    ) -> Result<Vec<DailyMetrics>, PlatformError> {
        let mut select = vec!["segments.date"];
        select.extend_from_slice(METRIC_FIELDS);
        let conditions = vec![date_condition(range)];

        let response = self
            .search(
                session,
                gaql(&select, "customer", &conditions, Some("segments.date")),
            )
            .await?;

        Ok(response
            .results
            .iter()
            .filter_map(|row| {
                let date = row
                    .segments
                    .as_ref()
                    .and_then(|s| s.date.as_deref())
                    .and_then(|d| d.parse().ok())?;
                Some(DailyMetrics {
                    date,
                    metrics: row.normalized_metrics()?,
                })
            })
            .collect())
    }
}

#[async_trait]
impl AccountListing for GoogleAdsBackend {
    /// List customer accounts the session's credentials can access.
    ///
    /// `listAccessibleCustomers` only returns resource names; the display
    /// name needs one `customer` query per account, and a failing detail
    /// query skips that account instead of aborting the listing.
    async fn accounts(&self, session: &AdSession) -> Result<AccountList, PlatformError> {
        let url = format!(
            "{}/{}/customers:listAccessibleCustomers",
            self.config.base_url, self.config.api_version
        );
        let headers = self.build_headers(&session.access_token)?;

        let response = self
            .client
            .get(&url)
            .headers(headers)
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

        let listing: AccessibleCustomers = response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;

        let mut accounts = Vec::new();
        let mut skipped = 0usize;
        for resource_name in &listing.resource_names {
            // "customers/1234567890" -> "1234567890"
            let Some(customer_id) = resource_name.strip_prefix("customers/") else {
                skipped += 1;
                continue;
            };
            let detail_session =
                AdSession::new(session.access_token.clone(), Some(customer_id.to_string()));
            let query = gaql(
                &[
                    "customer.id",
                    "customer.descriptive_name",
                    "customer.currency_code",
                ],
                "customer",
                &[],
                None,
            );
            match self.search(&detail_session, query).await {
                Ok(detail) => {
                    let customer = detail.results.first().and_then(|r| r.customer.as_ref());
                    accounts.push(AdAccount {
                        id: customer_id.to_string(),
                        name: customer
                            .and_then(|c| c.descriptive_name.clone())
                            .unwrap_or_else(|| customer_id.to_string()),
                        currency: customer.and_then(|c| c.currency_code.clone()),
                        status: None,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        customer_id,
                        error = %err,
                        "Skipping customer account, detail lookup failed"
                    );
                    skipped += 1;
                }
            }
        }

        Ok(AccountList { accounts, skipped })
    }
}

#[async_trait]
impl TokenRefresher for GoogleAdsBackend {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, PlatformError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(self.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| PlatformError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(status.as_u16(), body));
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;

        Ok(RefreshedToken {
            access_token: token.access_token,
            // Google keeps the refresh token stable unless re-consented
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            refresh_expires_in: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Typed response schemas - parsed once, never exposed past normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
    next_page_token: Option<String>,
    total_results_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRow {
    campaign: Option<GoogleCampaign>,
    campaign_budget: Option<GoogleCampaignBudget>,
    ad_group: Option<GoogleAdGroup>,
    ad_group_ad: Option<GoogleAdGroupAd>,
    customer: Option<GoogleCustomer>,
    metrics: Option<GoogleMetrics>,
    segments: Option<GoogleSegments>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCampaign {
    id: Option<String>,
    name: Option<String>,
    status: Option<String>,
    advertising_channel_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCampaignBudget {
    amount_micros: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAdGroup {
    id: Option<String>,
    name: Option<String>,
    status: Option<String>,
    cpc_bid_micros: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAdGroupAd {
    status: Option<String>,
    ad: Option<GoogleAd>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAd {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCustomer {
    descriptive_name: Option<String>,
    currency_code: Option<String>,
}

/// int64 metrics arrive as JSON strings; double metrics as numbers
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleMetrics {
    impressions: Option<String>,
    clicks: Option<String>,
    cost_micros: Option<String>,
    conversions: Option<f64>,
    conversions_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GoogleSegments {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessibleCustomers {
    #[serde(default)]
    resource_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn backend(server: &MockServer) -> GoogleAdsBackend {
        GoogleAdsBackend::new(AdapterConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            base_url: server.base_url(),
            api_version: "v16".to_string(),
            token_url: Some(format!("{}/token", server.base_url())),
            developer_token: Some("dev-token".to_string()),
            login_customer_id: None,
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_attempts: 1,
                initial_backoff: Duration::from_millis(1),
            },
        })
    }

    fn session() -> AdSession {
        AdSession::new("g-token", Some("1234567890".to_string()))
    }

    fn range() -> DateRange {
        DateRange::new("2024-01-01".parse().unwrap(), "2024-01-31".parse().unwrap())
    }

    #[test]
    fn gaql_assembly() {
        let query = gaql(
            &["campaign.id", "campaign.name"],
            "campaign",
            &["campaign.id IN (1, 2)".to_string(), date_condition(&range())],
            None,
        );
        assert_eq!(
            query,
            "SELECT campaign.id, campaign.name FROM campaign \
             WHERE campaign.id IN (1, 2) \
             AND segments.date BETWEEN '2024-01-01' AND '2024-01-31'"
        );
    }

    #[test]
    fn ad_filter_uses_the_wrapper_status_field() {
        let filter = EntityFilter {
            ids: Some(vec!["42".to_string()]),
            status: Some(EntityStatus::Paused),
        };
        let conditions =
            filter_conditions("ad_group_ad.ad.id", "ad_group_ad.status", Some(&filter))
                .expect("conditions");
        assert_eq!(
            conditions,
            vec![
                "ad_group_ad.ad.id IN (42)".to_string(),
                "ad_group_ad.status = 'PAUSED'".to_string(),
            ]
        );
    }

    #[test]
    fn non_numeric_filter_id_is_rejected() {
        let filter = EntityFilter {
            ids: Some(vec!["42) OR (1=1".to_string()]),
            status: None,
        };
        let err = filter_conditions("campaign.id", "campaign.status", Some(&filter)).unwrap_err();
        assert!(matches!(err, PlatformError::BadRequest(_)));

        let filter = EntityFilter {
            ids: None,
            status: Some(EntityStatus::Other("X'; DROP".to_string())),
        };
        let err = filter_conditions("campaign.id", "campaign.status", Some(&filter)).unwrap_err();
        assert!(matches!(err, PlatformError::BadRequest(_)));
    }

    #[tokio::test]
    async fn account_metrics_normalizes_micros() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v16/customers/1234567890/googleAds:search")
                .header("developer-token", "dev-token")
                .header("authorization", "Bearer g-token");
            then.status(200).json_body(serde_json::json!({
                "results": [{
                    "metrics": {
                        "impressions": "1000",
                        "clicks": "50",
                        "costMicros": "100000000"
                    }
                }]
            }));
        });

        let metrics = backend(&server)
            .account_metrics(&session(), &range())
            .await
            .expect("metrics");

        mock.assert();
        assert_eq!(metrics.impressions, 1000);
        assert_eq!(metrics.clicks, 50);
        assert_eq!(metrics.spend, 100.0);
        assert_eq!(metrics.ctr, 5.0);
        assert_eq!(metrics.cpc, 2.0);
        assert_eq!(metrics.cpm, 100.0);
    }

    #[tokio::test]
    async fn campaigns_normalize_rows_and_paging() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v16/customers/1234567890/googleAds:search");
            then.status(200).json_body(serde_json::json!({
                "results": [{
                    "campaign": {
                        "id": "111",
                        "name": "Brand",
                        "status": "ENABLED",
                        "advertisingChannelType": "SEARCH"
                    },
                    "campaignBudget": { "amountMicros": "50000000" }
                }],
                "nextPageToken": "tok",
                "totalResultsCount": "7"
            }));
        });

        let page = backend(&server)
            .campaigns(&session(), None, None)
            .await
            .expect("campaigns");

        assert_eq!(page.items.len(), 1);
        let campaign = &page.items[0];
        assert_eq!(campaign.id, "111");
        assert_eq!(campaign.status, EntityStatus::Active);
        assert_eq!(campaign.daily_budget, Some(50.0));
        assert!(campaign.metrics.is_none());
        assert!(page.has_more);
        assert_eq!(page.total_count, Some(7));
    }

    #[tokio::test]
    async fn business_error_carries_google_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v16/customers/1234567890/googleAds:search");
            then.status(400).json_body(serde_json::json!({
                "error": { "code": 400, "message": "invalid campaign id", "status": "INVALID_ARGUMENT" }
            }));
        });

        let err = backend(&server)
            .campaigns(&session(), None, None)
            .await
            .unwrap_err();
        match err {
            PlatformError::BadRequest(msg) => assert_eq!(msg, "invalid campaign id"),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_account_fails_without_network() {
        let server = MockServer::start();
        let err = backend(&server)
            .account_metrics(&AdSession::new("g-token", None), &range())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_exchanges_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=refresh_token");
            then.status(200).json_body(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3600
            }));
        });

        let token = backend(&server).refresh("old-refresh").await.expect("refresh");
        assert_eq!(token.access_token, "fresh");
        assert_eq!(token.expires_in, Some(3600));
        assert_eq!(token.refresh_token, None);
    }
}
