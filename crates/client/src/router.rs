//! Request dispatch: picks a resolution strategy per request and runs it.
//!
//! ### Routing
//! - Non-GET and cross-origin requests pass through untouched.
//! - Paths containing the API marker, and top-level navigations, go
//!   network-first so pages and data stay fresh while online.
//! - Everything else (styles, scripts, images, fonts) goes cache-first.
//!
//! ### Writes
//! Successful (200) network responses are copied into the dynamic cache on
//! a background task. The caller gets its response without waiting; use
//! [`CacheRouter::settle`] to wait for outstanding writes.

use std::sync::Arc;

use serde::Serialize;
use swcache_core::{CacheStorage, Destination, ResourceRequest, Response};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::fallback::OfflineFallback;
use crate::fetch::{Network, same_origin};
use crate::settings::WorkerSettings;

/// Resolution strategy for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

/// Where a returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    OfflinePage,
    Placeholder,
    Synthetic,
}

/// Result of handling one fetch event.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the caller uses default networking.
    PassThrough,
    Respond { response: Response, source: ResponseSource, strategy: Strategy },
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::PassThrough => None,
            FetchOutcome::Respond { response, .. } => Some(response),
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::PassThrough => None,
            FetchOutcome::Respond { source, .. } => Some(*source),
        }
    }
}

/// Routes requests between the cache stores and the network.
pub struct CacheRouter {
    settings: Arc<WorkerSettings>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    fallback: OfflineFallback,
    pending: Mutex<JoinSet<()>>,
}

impl CacheRouter {
    pub fn new(settings: Arc<WorkerSettings>, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        let fallback = OfflineFallback::new(settings.offline_page.clone(), settings.placeholder_image.clone());
        Self { settings, storage, network, fallback, pending: Mutex::new(JoinSet::new()) }
    }

    /// Strategy for a request, or `None` if it should pass through.
    pub fn strategy_for(&self, request: &ResourceRequest) -> Option<Strategy> {
        if !request.is_get() || !same_origin(&request.url, &self.settings.scope) {
            return None;
        }

        if request.url.path().contains(&self.settings.api_marker) || request.destination == Destination::Document {
            Some(Strategy::NetworkFirst)
        } else {
            Some(Strategy::CacheFirst)
        }
    }

    /// Handle an intercepted request. Always yields a response unless the
    /// request passes through.
    pub async fn handle(&self, request: &ResourceRequest) -> FetchOutcome {
        let Some(strategy) = self.strategy_for(request) else {
            tracing::trace!(method = %request.method, url = %request.url, "passing through");
            return FetchOutcome::PassThrough;
        };

        let (response, source) = match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        };

        FetchOutcome::Respond { response, source, strategy }
    }

    /// Stored copy if any, otherwise the network, otherwise an offline substitute.
    pub async fn cache_first(&self, request: &ResourceRequest) -> (Response, ResponseSource) {
        if let Some(cached) = self.lookup(request).await {
            tracing::debug!(url = %request.url, "serving from cache");
            return (cached, ResponseSource::Cache);
        }

        tracing::debug!(url = %request.url, "cache miss, fetching from network");
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_dynamic(request, &response).await;
                (response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::info!(url = %request.url, error = %e, "network error");
                match self.fallback.cached_substitute(self.storage.as_ref(), request.destination).await {
                    Some(substitute) => (substitute, substitute_source(request.destination)),
                    None => (OfflineFallback::resource_offline(), ResponseSource::Synthetic),
                }
            }
        }
    }

    /// Fresh network response if reachable, otherwise a stored copy, otherwise
    /// the offline page for navigations.
    pub async fn network_first(&self, request: &ResourceRequest) -> (Response, ResponseSource) {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_dynamic(request, &response).await;
                (response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::info!(url = %request.url, error = %e, "network-first failed, trying cache");

                if let Some(cached) = self.lookup(request).await {
                    return (cached, ResponseSource::Cache);
                }

                if request.destination == Destination::Document
                    && let Some(page) = self
                        .fallback
                        .cached_substitute(self.storage.as_ref(), Destination::Document)
                        .await
                {
                    return (page, ResponseSource::OfflinePage);
                }

                (OfflineFallback::page_offline(), ResponseSource::Synthetic)
            }
        }
    }

    /// Wait for every background cache write started so far.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().await);
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "cache write task failed");
            }
        }
    }

    /// Combined-keyspace lookup; storage errors count as a miss.
    async fn lookup(&self, request: &ResourceRequest) -> Option<Response> {
        match self.storage.match_any(&request.key()).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Copy a 200 response into the dynamic cache without blocking the caller.
    async fn store_dynamic(&self, request: &ResourceRequest, response: &Response) {
        if response.status != 200 {
            return;
        }

        let storage = Arc::clone(&self.storage);
        let cache = self.settings.dynamic_cache.clone();
        let key = request.key();
        let copy = response.clone();

        let mut pending = self.pending.lock().await;
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            if let Err(e) = storage.put(&cache, &key, copy).await {
                tracing::warn!(key = %key, error = %e, "failed to store response in dynamic cache");
            } else {
                tracing::trace!(key = %key, cache = %cache, "stored in dynamic cache");
            }
        });
    }
}

fn substitute_source(destination: Destination) -> ResponseSource {
    match destination {
        Destination::Image => ResponseSource::Placeholder,
        _ => ResponseSource::OfflinePage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedNetwork, html, text};
    use async_trait::async_trait;
    use swcache_core::{Error, MemoryStorage, RequestKey, WorkerConfig};
    use tokio::sync::Notify;
    use url::Url;

    const ORIGIN: &str = "https://site.example/";

    struct Fixture {
        router: CacheRouter,
        storage: Arc<MemoryStorage>,
        network: Arc<ScriptedNetwork>,
        settings: Arc<WorkerSettings>,
    }

    fn fixture(network: ScriptedNetwork) -> Fixture {
        let config = WorkerConfig { scope_url: ORIGIN.into(), ..Default::default() };
        let settings = Arc::new(WorkerSettings::from_config(&config).unwrap());
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(network);
        let router = CacheRouter::new(settings.clone(), storage.clone(), network.clone());
        Fixture { router, storage, network, settings }
    }

    fn req(path: &str, destination: Destination) -> ResourceRequest {
        ResourceRequest::get(Url::parse(ORIGIN).unwrap().join(path).unwrap(), destination)
    }

    /// Storage whose writes stay parked until released.
    struct GatedStorage {
        inner: MemoryStorage,
        gate: Notify,
    }

    #[async_trait]
    impl CacheStorage for GatedStorage {
        async fn open(&self, name: &str) -> Result<(), Error> {
            self.inner.open(name).await
        }

        async fn has(&self, name: &str) -> Result<bool, Error> {
            self.inner.has(name).await
        }

        async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
            self.inner.match_in(name, key).await
        }

        async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
            self.inner.match_any(key).await
        }

        async fn put(&self, name: &str, key: &RequestKey, response: Response) -> Result<(), Error> {
            self.gate.notified().await;
            self.inner.put(name, key, response).await
        }

        async fn delete(&self, name: &str) -> Result<bool, Error> {
            self.inner.delete(name).await
        }

        async fn keys(&self) -> Result<Vec<String>, Error> {
            self.inner.keys().await
        }

        async fn entry_count(&self, name: &str) -> Result<usize, Error> {
            self.inner.entry_count(name).await
        }
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let f = fixture(ScriptedNetwork::new());
        let post = ResourceRequest::new("POST", Url::parse("https://site.example/api/orders").unwrap(), Destination::Other);
        assert_eq!(f.router.handle(&post).await, FetchOutcome::PassThrough);
        assert_eq!(f.network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cross_origin_passes_through() {
        let f = fixture(ScriptedNetwork::new());
        let cdn = ResourceRequest::get(Url::parse("https://cdn.example/lib.js").unwrap(), Destination::Script);
        assert_eq!(f.router.strategy_for(&cdn), None);
        assert_eq!(f.router.handle(&cdn).await, FetchOutcome::PassThrough);
    }

    #[tokio::test]
    async fn test_strategy_selection() {
        let f = fixture(ScriptedNetwork::new());
        assert_eq!(f.router.strategy_for(&req("/api/orders", Destination::Other)), Some(Strategy::NetworkFirst));
        assert_eq!(f.router.strategy_for(&req("/fe.html", Destination::Document)), Some(Strategy::NetworkFirst));
        assert_eq!(f.router.strategy_for(&req("/css/estilo.css", Destination::Style)), Some(Strategy::CacheFirst));
        assert_eq!(f.router.strategy_for(&req("/images/a.jpg", Destination::Image)), Some(Strategy::CacheFirst));
    }

    #[tokio::test]
    async fn test_api_request_is_network_first_even_when_cached() {
        let f = fixture(ScriptedNetwork::new().route("https://site.example/api/orders", text(200, "fresh")));
        let request = req("/api/orders", Destination::Other);
        f.storage
            .put(&f.settings.static_cache, &request.key(), text(200, "stale"))
            .await
            .unwrap();

        let outcome = f.router.handle(&request).await;
        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        assert_eq!(outcome.response().unwrap().text(), "fresh");
        assert_eq!(f.network.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let f = fixture(ScriptedNetwork::new().route("https://site.example/css/estilo.css", text(200, "net")));
        let request = req("./css/estilo.css", Destination::Style);
        f.storage
            .put(&f.settings.static_cache, &request.key(), text(200, "cached"))
            .await
            .unwrap();

        let outcome = f.router.handle(&request).await;
        f.router.settle().await;

        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert_eq!(outcome.response().unwrap().text(), "cached");
        assert_eq!(f.network.calls(), 0);
        assert_eq!(f.storage.entry_count(&f.settings.dynamic_cache).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_stores_200() {
        let f = fixture(ScriptedNetwork::new().route("https://site.example/js/core.js", text(200, "js")));
        let request = req("/js/core.js", Destination::Script);

        let outcome = f.router.handle(&request).await;
        f.router.settle().await;

        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        let stored = f
            .storage
            .match_in(&f.settings.dynamic_cache, &request.key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.text(), "js");

        let again = f.router.handle(&request).await;
        assert_eq!(again.source(), Some(ResponseSource::Cache));
        assert_eq!(f.network.calls(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_write_does_not_block_response() {
        let config = WorkerConfig { scope_url: ORIGIN.into(), ..Default::default() };
        let settings = Arc::new(WorkerSettings::from_config(&config).unwrap());
        let storage = Arc::new(GatedStorage { inner: MemoryStorage::new(), gate: Notify::new() });
        let network = Arc::new(ScriptedNetwork::new().route("https://site.example/js/core.js", text(200, "js")));
        let router = CacheRouter::new(settings.clone(), storage.clone(), network);
        let request = req("/js/core.js", Destination::Script);

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), router.handle(&request))
            .await
            .expect("handle waited on the cache write");
        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        assert_eq!(outcome.response().unwrap().text(), "js");
        assert!(storage.inner.match_in(&settings.dynamic_cache, &request.key()).await.unwrap().is_none());

        storage.gate.notify_one();
        router.settle().await;

        let stored = storage.inner.match_in(&settings.dynamic_cache, &request.key()).await.unwrap();
        assert_eq!(stored.unwrap().text(), "js");
    }

    #[tokio::test]
    async fn test_large_200_is_returned_and_stored() {
        let body = vec![0xffu8; 8 * 1024 * 1024];
        let big = Response::synthetic(200, "image/jpeg", body.clone());
        let f = fixture(ScriptedNetwork::new().route("https://site.example/images/gallery/big.jpg", big));
        let request = req("/images/gallery/big.jpg", Destination::Image);

        let outcome = f.router.handle(&request).await;
        f.router.settle().await;

        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        assert_eq!(outcome.response().unwrap().status, 200);
        let stored = f
            .storage
            .match_in(&f.settings.dynamic_cache, &request.key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body.len(), body.len());
    }

    #[tokio::test]
    async fn test_cache_first_non_200_not_stored() {
        let f = fixture(ScriptedNetwork::new());
        let request = req("/missing.css", Destination::Style);

        let outcome = f.router.handle(&request).await;
        f.router.settle().await;

        assert_eq!(outcome.response().unwrap().status, 404);
        assert!(!f.storage.has(&f.settings.dynamic_cache).await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_first_offline_image_gets_placeholder() {
        let f = fixture(ScriptedNetwork::new());
        f.network.set_offline(true);
        let placeholder = Response::synthetic(200, "image/jpeg", vec![1u8, 2, 3]);
        f.storage
            .put(
                &f.settings.static_cache,
                &ResourceRequest::get(f.settings.placeholder_image.clone(), Destination::Image).key(),
                placeholder.clone(),
            )
            .await
            .unwrap();

        let outcome = f.router.handle(&req("/images/gallery/1.jpg", Destination::Image)).await;
        assert_eq!(outcome.source(), Some(ResponseSource::Placeholder));
        assert_eq!(outcome.response(), Some(&placeholder));
    }

    #[tokio::test]
    async fn test_cache_first_offline_other_is_408_plain() {
        let f = fixture(ScriptedNetwork::new());
        f.network.set_offline(true);

        let outcome = f.router.handle(&req("/fonts/a.woff2", Destination::Font)).await;
        let response = outcome.response().unwrap();
        assert_eq!(response.status, 408);
        assert_eq!(response.content_type(), Some("text/plain; charset=utf-8"));
        assert_eq!(outcome.source(), Some(ResponseSource::Synthetic));
    }

    #[tokio::test]
    async fn test_cache_first_offline_image_without_placeholder_is_408() {
        let f = fixture(ScriptedNetwork::new());
        f.network.set_offline(true);

        let outcome = f.router.handle(&req("/images/a.jpg", Destination::Image)).await;
        assert_eq!(outcome.response().unwrap().status, 408);
    }

    #[tokio::test]
    async fn test_network_first_200_is_stored() {
        let f = fixture(ScriptedNetwork::new().route("https://site.example/fe.html", html("<h1>fe</h1>")));
        let request = req("/fe.html", Destination::Document);

        let outcome = f.router.handle(&request).await;
        f.router.settle().await;

        assert_eq!(outcome.response().unwrap().text(), "<h1>fe</h1>");
        let stored = f
            .storage
            .match_in(&f.settings.dynamic_cache, &request.key())
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), outcome.response());
    }

    #[tokio::test]
    async fn test_network_first_non_200_returned_as_is() {
        let f = fixture(ScriptedNetwork::new().route("https://site.example/api/feed", text(503, "busy")));
        let request = req("/api/feed", Destination::Other);

        let outcome = f.router.handle(&request).await;
        f.router.settle().await;

        assert_eq!(outcome.response().unwrap().status, 503);
        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        assert!(f.storage.match_any(&request.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let f = fixture(ScriptedNetwork::new());
        f.network.set_offline(true);
        let request = req("/index.html", Destination::Document);
        f.storage
            .put(&f.settings.static_cache, &request.key(), html("<h1>cached index</h1>"))
            .await
            .unwrap();

        let outcome = f.router.handle(&request).await;
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert_eq!(outcome.response().unwrap().text(), "<h1>cached index</h1>");
    }

    #[tokio::test]
    async fn test_network_first_document_gets_offline_page() {
        let f = fixture(ScriptedNetwork::new());
        f.network.set_offline(true);
        let offline = Response::synthetic(200, "text/html", "<h1>sem conexão</h1>");
        f.storage
            .put(
                &f.settings.static_cache,
                &ResourceRequest::get(f.settings.offline_page.clone(), Destination::Document).key(),
                offline.clone(),
            )
            .await
            .unwrap();

        let outcome = f.router.handle(&req("/never-cached.html", Destination::Document)).await;
        assert_eq!(outcome.source(), Some(ResponseSource::OfflinePage));
        assert_eq!(outcome.response(), Some(&offline));
    }

    #[tokio::test]
    async fn test_network_first_api_offline_is_408_html() {
        let f = fixture(ScriptedNetwork::new());
        f.network.set_offline(true);

        let outcome = f.router.handle(&req("/api/orders", Destination::Other)).await;
        let response = outcome.response().unwrap();
        assert_eq!(response.status, 408);
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_concurrent_requests_each_stored() {
        let network = (0..8).fold(ScriptedNetwork::new(), |n, i| {
            n.route(&format!("https://site.example/img/{i}.png"), text(200, &i.to_string()))
        });
        let f = fixture(network);
        let requests: Vec<_> = (0..8).map(|i| req(&format!("/img/{i}.png"), Destination::Image)).collect();

        let outcomes = futures::future::join_all(requests.iter().map(|r| f.router.handle(r))).await;
        f.router.settle().await;

        assert!(outcomes.iter().all(|o| o.source() == Some(ResponseSource::Network)));
        assert_eq!(f.storage.entry_count(&f.settings.dynamic_cache).await.unwrap(), 8);
    }
}
