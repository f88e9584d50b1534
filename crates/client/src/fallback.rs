//! Offline substitutes for requests that neither cache nor network can answer.

use swcache_core::{CacheStorage, Destination, RequestKey, ResourceRequest, Response};
use url::Url;

/// Status used for synthesized offline responses (Request Timeout).
pub const OFFLINE_STATUS: u16 = 408;

const OFFLINE_TEXT: &str = "Recurso offline";
const OFFLINE_HTML: &str = "Página offline";

/// Fixed mapping from destination to the response served when offline.
#[derive(Debug, Clone)]
pub struct OfflineFallback {
    offline_page: RequestKey,
    placeholder_image: RequestKey,
}

impl OfflineFallback {
    pub fn new(offline_page: Url, placeholder_image: Url) -> Self {
        Self {
            offline_page: ResourceRequest::get(offline_page, Destination::Document).key(),
            placeholder_image: ResourceRequest::get(placeholder_image, Destination::Image).key(),
        }
    }

    /// The cached substitute for this destination, if one exists.
    ///
    /// Only documents and images have substitutes.
    pub async fn cached_substitute(&self, storage: &dyn CacheStorage, destination: Destination) -> Option<Response> {
        let key = match destination {
            Destination::Document => &self.offline_page,
            Destination::Image => &self.placeholder_image,
            _ => return None,
        };

        match storage.match_any(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "offline substitute lookup failed");
                None
            }
        }
    }

    /// Generic plain-text offline response.
    pub fn resource_offline() -> Response {
        Response::synthetic(OFFLINE_STATUS, "text/plain; charset=utf-8", OFFLINE_TEXT)
    }

    /// HTML-typed offline response for network-first requests.
    pub fn page_offline() -> Response {
        Response::synthetic(OFFLINE_STATUS, "text/html; charset=utf-8", OFFLINE_HTML)
    }
}
