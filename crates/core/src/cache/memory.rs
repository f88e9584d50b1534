//! In-memory cache storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CacheStorage;
use crate::Error;
use crate::request::{RequestKey, Response};

type Entries = HashMap<String, Response>;

/// Process-local cache storage.
///
/// Stores are kept in a Vec so global matching walks them in creation
/// order; the store count is tiny (one per cache generation).
#[derive(Clone, Default)]
pub struct MemoryStorage {
    stores: Arc<RwLock<Vec<(String, Entries)>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        if !stores.iter().any(|(n, _)| n == name) {
            stores.push((name.to_string(), HashMap::new()));
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.read().await.iter().any(|(n, _)| n == name))
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let digest = key.digest();
        let stores = self.stores.read().await;
        Ok(stores
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.get(&digest).cloned()))
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        let digest = key.digest();
        let stores = self.stores.read().await;
        Ok(stores.iter().find_map(|(_, entries)| entries.get(&digest).cloned()))
    }

    async fn put(&self, name: &str, key: &RequestKey, response: Response) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        let idx = match stores.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                stores.push((name.to_string(), HashMap::new()));
                stores.len() - 1
            }
        };
        stores[idx].1.insert(key.digest(), response);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|(n, _)| n != name);
        Ok(stores.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn entry_count(&self, name: &str) -> Result<usize, Error> {
        let stores = self.stores.read().await;
        Ok(stores
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0))
    }
}
