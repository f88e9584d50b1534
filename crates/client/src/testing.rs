//! Scripted network for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use swcache_core::{Error, ResourceRequest, Response};

use crate::fetch::Network;

/// Network fake: serves scripted responses by URL, 404 for anything else,
/// and fails every request while offline.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<Vec<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, response: Response) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), response);
        self
    }

    /// Make a single URL fail with a network error.
    pub fn fail(self, url: &str) -> Self {
        self.failing.lock().unwrap().push(url.to_string());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.as_str();
        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().iter().any(|u| u == url) {
            return Err(Error::Network(format!("offline: {url}")));
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Response::synthetic(404, "text/plain", "not found")))
    }
}

pub fn html(body: &str) -> Response {
    Response::synthetic(200, "text/html; charset=utf-8", body.to_string())
}

pub fn text(status: u16, body: &str) -> Response {
    Response::synthetic(status, "text/plain", body.to_string())
}
