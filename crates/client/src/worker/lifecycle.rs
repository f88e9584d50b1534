//! Install and activate phases.
//!
//! Install pre-populates the static cache; activate evicts every cache
//! generation that is neither the current static nor dynamic store. Both
//! return only after all of their storage work has resolved.

use futures::future::join_all;
use serde::Serialize;
use swcache_core::{Destination, Error, NamedCache, ResourceRequest};
use url::Url;

use super::{ServiceWorker, WorkerState};

/// A static asset that could not be pre-cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFailure {
    pub url: String,
    pub reason: String,
}

/// Summary of an install pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cache: String,
    pub cached: Vec<String>,
    pub failed: Vec<AssetFailure>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Summary of an activation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
}

impl ServiceWorker {
    /// Pre-populate the static cache.
    ///
    /// Asset failures are logged and reported but never fail the install;
    /// only a failure to open the static cache does, which leaves the
    /// worker redundant.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(
            |state| !matches!(state, WorkerState::Installing | WorkerState::Activating),
            WorkerState::Installing,
        )
        .await?;
        tracing::info!(cache = %self.settings.static_cache, assets = self.settings.static_assets.len(), "installing");

        let cache = match NamedCache::open(self.storage.clone(), &self.settings.static_cache).await {
            Ok(cache) => cache,
            Err(e) => {
                tracing::error!(cache = %self.settings.static_cache, error = %e, "failed to open static cache");
                self.status.write().await.state = WorkerState::Redundant;
                return Err(e);
            }
        };

        let results = join_all(self.settings.static_assets.iter().map(|url| self.precache(&cache, url))).await;

        let mut report = InstallReport { cache: cache.name().to_string(), cached: Vec::new(), failed: Vec::new() };
        for (url, result) in self.settings.static_assets.iter().zip(results) {
            match result {
                Ok(()) => report.cached.push(url.to_string()),
                Err(reason) => {
                    tracing::warn!(url = %url, reason = %reason, "failed to pre-cache asset");
                    report.failed.push(AssetFailure { url: url.to_string(), reason });
                }
            }
        }

        tracing::info!(cached = report.cached.len(), failed = report.failed.len(), "static cache populated");

        {
            let mut status = self.status.write().await;
            status.state = WorkerState::Installed;
        }
        self.skip_waiting().await;

        Ok(report)
    }

    /// Evict stale cache generations, then claim all clients.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(|state| state == WorkerState::Installed, WorkerState::Activating)
            .await?;
        tracing::info!("activating");

        match self.evict_stale().await {
            Ok(report) => {
                let mut status = self.status.write().await;
                status.state = WorkerState::Activated;
                status.clients_claimed = true;
                tracing::info!(deleted = report.deleted.len(), "activated, controlling clients");
                Ok(report)
            }
            Err(e) => {
                self.status.write().await.state = WorkerState::Installed;
                Err(e)
            }
        }
    }

    async fn precache(&self, cache: &NamedCache, url: &Url) -> Result<(), String> {
        let request = ResourceRequest::get(url.clone(), Destination::Other);
        let response = self.network.fetch(&request).await.map_err(|e| e.to_string())?;
        if !response.is_ok() {
            return Err(format!("HTTP {}", response.status));
        }
        cache.put(&request.key(), response).await.map_err(|e| e.to_string())
    }

    async fn evict_stale(&self) -> Result<ActivateReport, Error> {
        let (kept, stale): (Vec<String>, Vec<String>) = self
            .storage
            .keys()
            .await?
            .into_iter()
            .partition(|name| self.settings.is_current_cache(name));

        for name in &stale {
            tracing::warn!(cache = %name, "removing stale cache");
        }

        let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;
        let mut deleted = Vec::with_capacity(stale.len());
        let mut first_error = None;
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => deleted.push(name),
                Err(e) => {
                    tracing::error!(cache = %name, error = %e, "failed to delete stale cache");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(ActivateReport { deleted, kept }),
        }
    }
}
