//! Per-platform adapter backends
//!
//! Each backend translates the common operation set into one platform's
//! native API:
//!
//! ```text
//! CampaignQueryable / MetricsQueryable / AccountListing / TokenRefresher
//!     ├── GoogleAdsBackend  — GAQL posted to googleAds:search
//!     ├── TikTokBackend     — REST with JSON filtering / report params
//!     └── FacebookBackend   — Graph API field-selector GETs
//! ```
//!
//! Backends are constructed from an explicit [`AdapterConfig`]; they never
//! read environment variables or any other ambient state.

pub mod facebook;
pub mod google;
pub mod tiktok;

use crate::retry::RetryPolicy;
use std::time::Duration;

pub use facebook::FacebookBackend;
pub use google::GoogleAdsBackend;
pub use tiktok::TikTokBackend;

/// Configuration for one platform backend
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// OAuth client id (app id)
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Base URL for the platform API
    pub base_url: String,
    /// API version path segment (e.g. "v18.0", "v1.3", "v16")
    pub api_version: String,
    /// Override for the OAuth token endpoint; each backend falls back to
    /// the platform's production endpoint when unset
    pub token_url: Option<String>,
    /// Google Ads developer token
    pub developer_token: Option<String>,
    /// Google Ads manager account sent as login-customer-id
    pub login_customer_id: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Retry budget for transient failures
    pub retry: RetryPolicy,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            base_url: String::new(),
            api_version: String::new(),
            token_url: None,
            developer_token: None,
            login_customer_id: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&config::PlatformConfig> for AdapterConfig {
    fn from(platform: &config::PlatformConfig) -> Self {
        Self {
            client_id: platform.client_id.clone(),
            client_secret: platform.client_secret.clone(),
            base_url: platform.base_url.clone(),
            api_version: platform.api_version.clone(),
            token_url: platform.token_url.clone(),
            developer_token: platform.developer_token.clone(),
            login_customer_id: platform.login_customer_id.clone(),
            timeout: Duration::from_secs(platform.timeout_secs),
            retry: RetryPolicy {
                max_attempts: platform.retry.max_attempts,
                initial_backoff: Duration::from_millis(platform.retry.initial_backoff_ms),
            },
        }
    }
}


/// Build the shared HTTP client every backend uses
pub(crate) fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .expect("Failed to create HTTP client")
}
