//! sw_fetch tool implementation.
//!
//! Runs a request through the worker's router and reports which strategy
//! and source produced the response.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{FetchOutcome, ResponseSource, ServiceWorker, Strategy, fetch::resolve};
use swcache_core::{Destination, Error, ResourceRequest};

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// URL to request; relative URLs resolve against the worker scope.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination: document, image, style, script, font, manifest.
    /// Anything else (iframe, video, empty) is treated as other.
    #[serde(default)]
    pub destination: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The absolute URL that was requested.
    pub url: String,
    /// True when the worker did not intercept the request.
    pub passthrough: bool,
    /// Strategy used: cache_first or network_first.
    pub strategy: Option<String>,
    /// Where the response came from: cache, network, offline_page, placeholder, synthetic.
    pub source: Option<String>,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    /// Response body, lossily decoded as UTF-8.
    pub body: Option<String>,
}

fn label<T: Serialize>(value: T) -> Option<String> {
    serde_json::to_value(value).ok().and_then(|v| v.as_str().map(String::from))
}

fn to_output(url: String, outcome: FetchOutcome) -> SwFetchOutput {
    match outcome {
        FetchOutcome::PassThrough => SwFetchOutput {
            url,
            passthrough: true,
            strategy: None,
            source: None,
            status: None,
            content_type: None,
            body: None,
        },
        FetchOutcome::Respond { response, source, strategy } => SwFetchOutput {
            url,
            passthrough: false,
            strategy: label::<Strategy>(strategy),
            source: label::<ResponseSource>(source),
            status: Some(response.status),
            content_type: response.content_type().map(String::from),
            body: Some(response.text()),
        },
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(worker: &ServiceWorker, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = resolve(&worker.settings().scope, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let destination = Destination::from(params.destination.as_str());
    let request = ResourceRequest::new(&params.method, url, destination);

    let outcome = worker.fetch(&request).await;
    let output = to_output(request.url.to_string(), outcome);

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
