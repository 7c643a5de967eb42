use serde::Deserialize;
use std::env;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub platforms: PlatformsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            logging: LoggingConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            platforms: PlatformsConfig::from_env()?,
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
        })
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    5
}

impl DatabaseConfig {
    /// Create a connection URL for this database configuration
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("DATABASE_HOST").map_err(|_| "DATABASE_HOST not set")?,
            port: env::var("DATABASE_PORT")
                .map_err(|_| "DATABASE_PORT not set")?
                .parse()
                .map_err(|_| "DATABASE_PORT must be a valid port number")?,
            database: env::var("DATABASE_NAME").map_err(|_| "DATABASE_NAME not set")?,
            username: env::var("DATABASE_USERNAME").map_err(|_| "DATABASE_USERNAME not set")?,
            password: env::var("DATABASE_PASSWORD").map_err(|_| "DATABASE_PASSWORD not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| "DATABASE_MAX_CONNECTIONS must be a valid number")?,
        })
    }
}

/// Configuration for all three platform adapters
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformsConfig {
    pub facebook: PlatformConfig,
    pub tiktok: PlatformConfig,
    pub google_ads: PlatformConfig,
}

impl PlatformsConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            facebook: PlatformConfig::from_env_with_prefix("FACEBOOK")?,
            tiktok: PlatformConfig::from_env_with_prefix("TIKTOK")?,
            google_ads: PlatformConfig::from_env_with_prefix("GOOGLE_ADS")?,
        })
    }
}

/// Per-platform adapter configuration
///
/// Every adapter is constructed from one of these; adapters never read
/// environment variables themselves.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// OAuth client id (app id for Facebook, app id for TikTok)
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Base URL for the platform API
    pub base_url: String,
    /// API version path segment (e.g. "v18.0", "v1.3", "v16")
    pub api_version: String,
    /// Override for the OAuth token endpoint; adapters fall back to the
    /// platform's production endpoint when unset
    #[serde(default)]
    pub token_url: Option<String>,
    /// How long normalized metrics for this platform stay cached
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Google Ads developer token; unused by the other platforms
    #[serde(default)]
    pub developer_token: Option<String>,
    /// Google Ads manager account id sent as login-customer-id
    #[serde(default)]
    pub login_customer_id: Option<String>,
    /// Retry budget for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

impl PlatformConfig {
    /// Load from environment variables with a platform prefix
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, String> {
        Ok(Self {
            client_id: env::var(format!("{prefix}_CLIENT_ID"))
                .map_err(|_| format!("{prefix}_CLIENT_ID not set"))?,
            client_secret: env::var(format!("{prefix}_CLIENT_SECRET"))
                .map_err(|_| format!("{prefix}_CLIENT_SECRET not set"))?,
            base_url: env::var(format!("{prefix}_BASE_URL"))
                .map_err(|_| format!("{prefix}_BASE_URL not set"))?,
            api_version: env::var(format!("{prefix}_API_VERSION"))
                .map_err(|_| format!("{prefix}_API_VERSION not set"))?,
            token_url: env::var(format!("{prefix}_TOKEN_URL")).ok(),
            cache_ttl_secs: env::var(format!("{prefix}_CACHE_TTL_SECS"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_cache_ttl_secs),
            timeout_secs: env::var(format!("{prefix}_TIMEOUT_SECS"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_timeout_secs),
            developer_token: env::var(format!("{prefix}_DEVELOPER_TOKEN")).ok(),
            login_customer_id: env::var(format!("{prefix}_LOGIN_CUSTOMER_ID")).ok(),
            retry: RetryConfig::from_env_with_prefix(prefix)?,
        })
    }
}

/// Bounded exponential-backoff retry budget for transient platform failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

impl RetryConfig {
    /// Load from environment variables with a platform prefix
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, String> {
        Ok(Self {
            max_attempts: match env::var(format!("{prefix}_RETRY_MAX_ATTEMPTS")) {
                Ok(s) => s
                    .parse()
                    .map_err(|_| format!("{prefix}_RETRY_MAX_ATTEMPTS must be a valid number"))?,
                Err(_) => default_retry_attempts(),
            },
            initial_backoff_ms: match env::var(format!("{prefix}_RETRY_INITIAL_BACKOFF_MS")) {
                Ok(s) => s.parse().map_err(|_| {
                    format!("{prefix}_RETRY_INITIAL_BACKOFF_MS must be a valid number")
                })?,
                Err(_) => default_retry_backoff_ms(),
            },
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_backoff_ms: default_retry_backoff_ms(),
        }
    }
}
