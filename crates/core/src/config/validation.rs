//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

const MAX_CONCURRENT_FETCHES: usize = 64;
const MAX_BODY_BYTES: usize = 512 * 1024 * 1024;

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `port` is 0
    /// - `max_concurrent_fetches` is 0 or exceeds 64
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 512MB
    /// - `user_agent` is empty
    /// - `archive_base_url` is not an http(s) URL
    /// - `admin_path` does not start with `/` or is the root path
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid { field: "port".into(), reason: "must be greater than 0".into() });
        }

        if self.max_concurrent_fetches == 0 || self.max_concurrent_fetches > MAX_CONCURRENT_FETCHES {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_fetches".into(),
                reason: format!("must be between 1 and {MAX_CONCURRENT_FETCHES}"),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > MAX_BODY_BYTES {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 512MB".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        match url::Url::parse(&self.archive_base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ConfigError::Invalid {
                    field: "archive_base_url".into(),
                    reason: format!("unsupported scheme: {}", parsed.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "archive_base_url".into(), reason: e.to_string() });
            }
        }

        if let Some(path) = &self.admin_path
            && (!path.starts_with('/') || path.trim_end_matches('/').is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "admin_path".into(),
                reason: "must start with '/' and not be the root path".into(),
            });
        }

        if let Some(path) = &self.admin_path
            && path.contains(['{', '}', '*'])
        {
            return Err(ConfigError::Invalid {
                field: "admin_path".into(),
                reason: "must not contain route captures or wildcards".into(),
            });
        }

        if self.history_len == 0 {
            tracing::warn!("history_len is 0; the admin page will not list recent URLs");
        }

        Ok(())
    }
}
