//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WAYBACK_PROXY_*)
//! 2. TOML config file (if WAYBACK_PROXY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::timestamp::ArchiveTimestamp;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WAYBACK_PROXY_*)
/// 2. TOML config file (if WAYBACK_PROXY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the proxy listens on.
    ///
    /// Set via WAYBACK_PROXY_HOST environment variable.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the proxy listens on.
    ///
    /// Set via WAYBACK_PROXY_PORT environment variable.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to SQLite cache database.
    ///
    /// Set via WAYBACK_PROXY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the archive service.
    ///
    /// Set via WAYBACK_PROXY_ARCHIVE_BASE_URL environment variable.
    #[serde(default = "default_archive_base_url")]
    pub archive_base_url: String,

    /// Initial target timestamp; the current time when unset.
    ///
    /// Set via WAYBACK_PROXY_TIMESTAMP environment variable (yyyyMMddHHmmss).
    #[serde(default)]
    pub timestamp: Option<ArchiveTimestamp>,

    /// Mount path of the admin interface; disabled when unset.
    ///
    /// Set via WAYBACK_PROXY_ADMIN_PATH environment variable.
    #[serde(default)]
    pub admin_path: Option<String>,

    /// Upper bound on concurrent requests to the archive service.
    ///
    /// Set via WAYBACK_PROXY_MAX_CONCURRENT_FETCHES environment variable.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Archive request timeout in milliseconds, applied to connect and to the whole request.
    ///
    /// Set via WAYBACK_PROXY_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted per archived response.
    ///
    /// Set via WAYBACK_PROXY_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Redirects followed when the archive points at the nearest capture.
    ///
    /// Set via WAYBACK_PROXY_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent string for archive requests.
    ///
    /// Set via WAYBACK_PROXY_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Number of recently requested URLs kept for the admin page.
    ///
    /// Set via WAYBACK_PROXY_HISTORY_LEN environment variable.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./wayback-proxy-cache.sqlite")
}

fn default_archive_base_url() -> String {
    "https://web.archive.org".into()
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_bytes() -> usize {
    52_428_800 // 50MB
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    "wayback-proxy/0.1".into()
}

fn default_history_len() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            archive_base_url: default_archive_base_url(),
            timestamp: None,
            admin_path: None,
            max_concurrent_fetches: default_max_concurrent_fetches(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            history_len: default_history_len(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `host:port` for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured start timestamp, or now.
    pub fn initial_timestamp(&self) -> ArchiveTimestamp {
        self.timestamp.unwrap_or_else(ArchiveTimestamp::now)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WAYBACK_PROXY_`
    /// 2. TOML file from `WAYBACK_PROXY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WAYBACK_PROXY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WAYBACK_PROXY_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.db_path, PathBuf::from("./wayback-proxy-cache.sqlite"));
        assert_eq!(config.archive_base_url, "https://web.archive.org");
        assert_eq!(config.max_concurrent_fetches, 4);
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.user_agent, "wayback-proxy/0.1");
        assert_eq!(config.history_len, 10);
        assert!(config.timestamp.is_none());
        assert!(config.admin_path.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_initial_timestamp_prefers_configured_value() {
        let ts = ArchiveTimestamp::parse("19990101000000").unwrap();
        let config = AppConfig { timestamp: Some(ts), ..Default::default() };
        assert_eq!(config.initial_timestamp(), ts);
    }

    #[test]
    fn test_figment_reads_toml_layer() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "proxy.toml",
                r#"
                    port = 9090
                    timestamp = "20050505050505"
                    admin_path = "/admin"
                "#,
            )?;
            jail.set_env("WAYBACK_PROXY_CONFIG_FILE", "proxy.toml");
            jail.set_env("WAYBACK_PROXY_MAX_CONCURRENT_FETCHES", "2");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.port, 9090);
            assert_eq!(config.max_concurrent_fetches, 2);
            assert_eq!(config.admin_path.as_deref(), Some("/admin"));
            assert_eq!(config.timestamp.map(|t| t.to_string()).as_deref(), Some("20050505050505"));
            Ok(())
        });
    }

    #[test]
    fn test_env_timestamp_digits() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("WAYBACK_PROXY_TIMESTAMP", "20010101000000");
            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.initial_timestamp().to_string(), "20010101000000");
            Ok(())
        });
    }
}
