// Configuration Management
//
// This crate handles all configuration loading and management for the
// integration core. It provides:
// - Configuration structs and deserialization
// - File loading logic
// - Default configuration values
//
// This keeps configuration concerns separate from domain logic.

use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found. Tried paths: {paths}")]
    FileNotFound { paths: String },

    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },
}

/// Main configuration loading interface
impl AppConfig {
    /// Load configuration from YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        // Try different config locations in order
        let config_paths = ["config/config.yaml", "config.yaml", "config/default.yaml"];

        for path in &config_paths {
            if std::path::Path::new(path).exists() {
                return Self::load_from_file(path);
            }
        }

        // If no config file found, fail with descriptive error
        Err(ConfigError::FileNotFound {
            paths: config_paths.join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
logging:
  level: debug
database:
  host: localhost
  port: 5432
  database: adboard
  username: postgres
  password: postgres
  max_connections: 5
platforms:
  facebook:
    client_id: fb-client
    client_secret: fb-secret
    base_url: https://graph.facebook.com
    api_version: v18.0
    cache_ttl_secs: 300
  tiktok:
    client_id: tt-app
    client_secret: tt-secret
    base_url: https://business-api.tiktok.com/open_api
    api_version: v1.3
    cache_ttl_secs: 300
  google_ads:
    client_id: g-client
    client_secret: g-secret
    base_url: https://googleads.googleapis.com
    api_version: v16
    cache_ttl_secs: 3600
    developer_token: dev-token
"#;
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write yaml");

        let config = AppConfig::load_from_file(file.path()).expect("load config");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.platforms.google_ads.api_version, "v16");
        assert_eq!(config.platforms.google_ads.cache_ttl_secs, 3600);
        assert_eq!(
            config.platforms.google_ads.developer_token.as_deref(),
            Some("dev-token")
        );
        // Retry budget falls back to the defaults when not listed
        assert_eq!(config.platforms.facebook.retry.max_attempts, 3);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AppConfig::load_from_file("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }
}
