//! Configuration validation rules.
//!
//! This module provides validation logic for `WorkerConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::WorkerConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `scope_url` is not an absolute http(s) URL
    /// - either cache name is empty, or both names are equal
    /// - `api_marker` or `user_agent` is empty
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scope = self.scope()?;
        if !matches!(scope.scheme(), "http" | "https") {
            return Err(invalid("scope_url", "must use http or https"));
        }

        if self.static_cache.trim().is_empty() {
            return Err(invalid("static_cache", "must not be empty"));
        }
        if self.dynamic_cache.trim().is_empty() {
            return Err(invalid("dynamic_cache", "must not be empty"));
        }
        if self.static_cache == self.dynamic_cache {
            return Err(invalid("dynamic_cache", "must differ from static_cache"));
        }

        if self.api_marker.is_empty() {
            return Err(invalid("api_marker", "must not be empty"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !self.static_assets.iter().any(|a| a == &self.offline_page) {
            tracing::warn!(
                offline_page = %self.offline_page,
                "offline_page is not in static_assets; navigation fallback will only work once it is cached"
            );
        }

        Ok(())
    }
}
