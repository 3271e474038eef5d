//! Configuration management for the newsdesk engine
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Outbound feed-fetch configuration
    pub fetch: FetchConfig,

    /// Site identity used by the RSS export
    pub site: SiteConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: PathBuf,
}

/// Outbound fetch configuration for the RSS pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Rate limit (requests per second)
    pub rate_limit: u32,

    /// User agent string sent to upstream feeds
    pub user_agent: String,

    /// Author id assigned to articles imported from feeds
    pub import_author_id: i64,
}

impl FetchConfig {
    /// Request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Site identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site display name
    pub name: String,

    /// Public base URL, no trailing slash
    pub base_url: String,

    /// Default content language
    pub language: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host =
            std::env::var("NEWSDESK_HOST").unwrap_or_else(|_| String::from("127.0.0.1"));

        let port = std::env::var("NEWSDESK_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        let database_path = std::env::var("NEWSDESK_DB_PATH")
            .unwrap_or_else(|_| String::from("data/newsdesk.db"))
            .into();

        let timeout_secs = std::env::var("NEWSDESK_FETCH_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let rate_limit = std::env::var("NEWSDESK_FETCH_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(2);

        let user_agent = std::env::var("NEWSDESK_USER_AGENT")
            .unwrap_or_else(|_| format!("newsdesk-rss-reader/{}", env!("CARGO_PKG_VERSION")));

        let import_author_id = std::env::var("NEWSDESK_IMPORT_AUTHOR_ID")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1);

        let site_name =
            std::env::var("NEWSDESK_SITE_NAME").unwrap_or_else(|_| String::from("News Website"));

        let base_url = std::env::var("NEWSDESK_SITE_URL")
            .unwrap_or_else(|_| String::from("http://localhost:8080"));

        let language =
            std::env::var("NEWSDESK_LANGUAGE").unwrap_or_else(|_| String::from("en"));

        let log_level =
            std::env::var("NEWSDESK_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("NEWSDESK_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                path: database_path,
            },
            fetch: FetchConfig {
                timeout_secs,
                rate_limit,
                user_agent,
                import_author_id,
            },
            site: SiteConfig {
                name: site_name,
                base_url,
                language,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout_secs == 0 {
            anyhow::bail!("fetch timeout must be greater than 0");
        }

        if self.fetch.rate_limit == 0 {
            anyhow::bail!("fetch rate_limit must be greater than 0");
        }

        if self.site.base_url.ends_with('/') {
            anyhow::bail!("site base_url must not end with a slash");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_defaults() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.import_author_id, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::from_env().unwrap();
        config.fetch.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_trailing_slash() {
        let mut config = Config::from_env().unwrap();
        config.site.base_url = String::from("http://example.com/");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9090

            [database]
            path = "/tmp/test.db"

            [fetch]
            timeout_secs = 10
            rate_limit = 5
            user_agent = "test-agent"
            import_author_id = 2

            [site]
            name = "Test Site"
            base_url = "http://test.local"
            language = "en"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.fetch.import_author_id, 2);
        assert!(config.validate().is_ok());
    }
}
