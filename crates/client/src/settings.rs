//! Worker settings resolved from configuration.

use swcache_core::{Error, WorkerConfig};
use url::Url;

use crate::fetch::resolve;

/// Configuration with every path resolved to an absolute URL.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub scope: Url,
    pub static_cache: String,
    pub dynamic_cache: String,
    pub static_assets: Vec<Url>,
    pub offline_page: Url,
    pub placeholder_image: Url,
    pub api_marker: String,
    pub sync_tag: String,
}

impl WorkerSettings {
    /// Resolve a loaded configuration against its scope.
    pub fn from_config(config: &WorkerConfig) -> Result<Self, Error> {
        let scope = config.scope().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let at = |path: &str| resolve(&scope, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")));

        let mut static_assets = Vec::with_capacity(config.static_assets.len());
        for path in &config.static_assets {
            let url = at(path)?;
            if !static_assets.contains(&url) {
                static_assets.push(url);
            }
        }

        Ok(Self {
            offline_page: at(&config.offline_page)?,
            placeholder_image: at(&config.placeholder_image)?,
            static_assets,
            static_cache: config.static_cache.clone(),
            dynamic_cache: config.dynamic_cache.clone(),
            api_marker: config.api_marker.clone(),
            sync_tag: config.sync_tag.clone(),
            scope,
        })
    }

    /// Whether a cache name belongs to the current generation.
    pub fn is_current_cache(&self, name: &str) -> bool {
        name == self.static_cache || name == self.dynamic_cache
    }
}
