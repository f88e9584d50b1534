//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Which cache storage backend the worker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// URL the worker is registered at; relative asset paths resolve against it
    /// and its origin decides which requests are intercepted.
    ///
    /// Set via SWCACHE_SCOPE_URL environment variable.
    #[serde(default = "default_scope_url")]
    pub scope_url: String,

    /// Name of the versioned static cache. Bump it whenever `static_assets` changes.
    ///
    /// Set via SWCACHE_STATIC_CACHE environment variable.
    #[serde(default = "default_static_cache")]
    pub static_cache: String,

    /// Name of the runtime-populated cache.
    ///
    /// Set via SWCACHE_DYNAMIC_CACHE environment variable.
    #[serde(default = "default_dynamic_cache")]
    pub dynamic_cache: String,

    /// Paths pre-cached on install, relative to `scope_url`.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Page served for failed navigations.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Image served for failed image requests.
    #[serde(default = "default_placeholder_image")]
    pub placeholder_image: String,

    /// Path segment that marks API requests (always network-first).
    #[serde(default = "default_api_marker")]
    pub api_marker: String,

    /// Background sync tag that triggers reconciliation.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// User-Agent string for network requests.
    ///
    /// Set via SWCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    ///
    /// Set via SWCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Storage backend.
    ///
    /// Set via SWCACHE_STORAGE environment variable (`memory` or `sqlite`).
    #[serde(default)]
    pub storage: StorageBackend,

    /// Path to SQLite database when `storage = "sqlite"`.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_scope_url() -> String {
    "http://localhost:8080/".into()
}

fn default_static_cache() -> String {
    "biblia-static-v3".into()
}

fn default_dynamic_cache() -> String {
    "biblia-dynamic-v1".into()
}

fn default_static_assets() -> Vec<String> {
    [
        "./",
        "./index.html",
        "./versiculos.html",
        "./livros-da-biblia.html",
        "./feedback.html",
        "./feedback-admin.html",
        "./resources.html",
        "./fe.html",
        "./coragem.html",
        "./sabedoria.html",
        "./esperanca.html",
        "./reflexao.html",
        "./css/estilo.css",
        "./js/core.js",
        "./js/gallery.js",
        "./js/feedback.js",
        "./manifest.json",
        "./favicon.svg",
        "./offline.html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_offline_page() -> String {
    "./offline.html".into()
}

fn default_placeholder_image() -> String {
    "./images/placeholder.jpg".into()
}

fn default_api_marker() -> String {
    "/api/".into()
}

fn default_sync_tag() -> String {
    "background-sync".into()
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scope_url: default_scope_url(),
            static_cache: default_static_cache(),
            dynamic_cache: default_dynamic_cache(),
            static_assets: default_static_assets(),
            offline_page: default_offline_page(),
            placeholder_image: default_placeholder_image(),
            api_marker: default_api_marker(),
            sync_tag: default_sync_tag(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            storage: StorageBackend::default(),
            db_path: default_db_path(),
        }
    }
}

impl WorkerConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed scope URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `scope_url` does not parse.
    pub fn scope(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.scope_url)
            .map_err(|e| ConfigError::Invalid { field: "scope_url".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
