//! swcache server entry point.
//!
//! Boots the caching worker (install, then activate) and serves it over MCP
//! on stdio. Logging goes to stderr to avoid interfering with the JSON-RPC
//! protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchConfig, HttpNetwork, ServiceWorker, WorkerSettings};
use swcache_core::{CacheStorage, MemoryStorage, SqliteStorage, StorageBackend, WorkerConfig};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

async fn open_storage(config: &WorkerConfig) -> Result<Arc<dyn CacheStorage>> {
    Ok(match config.storage {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::Sqlite => {
            let storage = SqliteStorage::open(&config.db_path).await?;
            tracing::info!(
                path = %config.db_path.display(),
                schema = storage.schema_version().await?,
                "cache database ready"
            );
            Arc::new(storage)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = WorkerConfig::load()?;
    tracing::info!(scope = %config.scope_url, storage = ?config.storage, "Starting swcache worker");

    let storage = open_storage(&config).await?;
    let network = Arc::new(HttpNetwork::new(FetchConfig::from(&config))?);
    let worker = Arc::new(ServiceWorker::new(WorkerSettings::from_config(&config)?, storage, network));

    let (installed, activated) = worker.start().await?;
    tracing::info!(
        cached = installed.cached.len(),
        failed = installed.failed.len(),
        evicted = activated.deleted.len(),
        "worker active"
    );

    let handler = handler::SwCacheServer::new(worker.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    worker.router().settle().await;

    Ok(())
}
