//! Lifecycle and control-plane tools: sw_install, sw_activate, sw_message, sw_sync.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{MessageOutcome, ServiceWorker};
use swcache_core::Error;
use tokio::sync::oneshot;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message type, e.g. "SKIP_WAITING" or "GET_VERSION".
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Parameters for the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Sync tag (the worker handles "background-sync" by default).
    pub tag: String,
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Implementation of the sw_install tool.
pub async fn install_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let report = worker.install().await?;
    json_result(&report)
}

/// Implementation of the sw_activate tool.
pub async fn activate_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let report = worker.activate().await?;
    json_result(&report)
}

/// Implementation of the sw_message tool.
pub async fn message_impl(worker: &ServiceWorker, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let data = serde_json::json!({ "type": params.message_type });
    let (port, reply) = oneshot::channel();

    let outcome = worker.post_message(&data, Some(port)).await?;
    if let MessageOutcome::Version(_) = outcome {
        // The worker answers on the port before returning.
        if let Ok(version) = reply.await {
            tracing::debug!(version = %version.version, "version reply received");
        }
    }

    json_result(&outcome)
}

/// Implementation of the sw_sync tool.
pub async fn sync_impl(worker: &ServiceWorker, params: SwSyncParams) -> Result<CallToolResult, McpError> {
    let outcome = worker.sync(&params.tag).await;
    json_result(&outcome)
}
