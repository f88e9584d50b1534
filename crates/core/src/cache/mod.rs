//! Named cache stores keyed by request identity.
//!
//! Storage is an injected service rather than a global: the worker only
//! sees the [`CacheStorage`] trait, which has two implementations:
//!
//! - [`MemoryStorage`]: process-local, used by tests and ephemeral workers
//! - [`SqliteStorage`]: persistent, via tokio-rusqlite with WAL mode
//!
//! Absence of a store or a key is a normal miss (`Ok(None)`), never an error.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::sync::Arc;

use async_trait::async_trait;

pub use crate::Error;
use crate::request::{RequestKey, Response};

pub use connection::SqliteStorage;
pub use memory::MemoryStorage;

/// Cache storage facility: a set of named stores mapping request keys to responses.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Whether a store with this name exists.
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Look up a key in a single store.
    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Look up a key across every store, oldest store first.
    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Store a response under a key, opening the store if needed.
    ///
    /// An existing entry for the same key is replaced.
    async fn put(&self, name: &str, key: &RequestKey, response: Response) -> Result<(), Error>;

    /// Remove a store and all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Names of all stores, in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Number of entries in a store (0 if it does not exist).
    async fn entry_count(&self, name: &str) -> Result<usize, Error>;
}

/// Handle to one opened store.
#[derive(Clone)]
pub struct NamedCache {
    storage: Arc<dyn CacheStorage>,
    name: String,
}

impl NamedCache {
    /// Open (creating if needed) the named store.
    pub async fn open(storage: Arc<dyn CacheStorage>, name: &str) -> Result<Self, Error> {
        storage.open(name).await?;
        Ok(Self { storage, name: name.to_string() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn put(&self, key: &RequestKey, response: Response) -> Result<(), Error> {
        self.storage.put(&self.name, key, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(url: &str) -> RequestKey {
        RequestKey { method: "GET".into(), url: url.into() }
    }

    #[tokio::test]
    async fn test_named_cache_roundtrip() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let cache = NamedCache::open(storage.clone(), "site-static-v1").await.unwrap();
        assert_eq!(cache.name(), "site-static-v1");
        assert!(storage.has("site-static-v1").await.unwrap());

        cache
            .put(&key("https://example.com/app.js"), Response::synthetic(200, "text/javascript", "1"))
            .await
            .unwrap();

        assert_eq!(storage.entry_count("site-static-v1").await.unwrap(), 1);
        let hit = storage.match_in("site-static-v1", &key("https://example.com/app.js")).await.unwrap();
        assert_eq!(hit.unwrap().text(), "1");
    }
}
