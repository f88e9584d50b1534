//! sw_caches tool implementation.
//!
//! Lists every cache store with its entry count and whether it belongs to
//! the current generation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::ServiceWorker;
use swcache_core::{CacheStorage, Error};

/// One cache store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInfo {
    pub name: String,
    pub entries: usize,
    /// False for stores the next activation would delete.
    pub current: bool,
}

/// Output from the sw_caches tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwCachesOutput {
    /// Lifecycle state of the worker.
    pub state: String,
    pub skip_waiting: bool,
    pub clients_claimed: bool,
    pub caches: Vec<CacheInfo>,
}

/// Implementation of the sw_caches tool.
pub async fn caches_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let storage = worker.storage();
    let mut caches = Vec::new();
    for name in storage.keys().await? {
        let entries = storage.entry_count(&name).await?;
        let current = worker.settings().is_current_cache(&name);
        caches.push(CacheInfo { name, entries, current });
    }

    let status = worker.status().await;
    let output = SwCachesOutput {
        state: serde_json::to_value(status.state)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default(),
        skip_waiting: status.skip_waiting,
        clients_claimed: status.clients_claimed,
        caches,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
