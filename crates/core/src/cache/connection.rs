//! SQLite-backed cache storage handle.
//!
//! Stores and entries persist across worker restarts, so a version bump
//! that keeps the dynamic tag also keeps every response cached at runtime.

use std::path::Path;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

/// `foreign_keys` must be on for deleting a store to cascade to its entries.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Persistent [`CacheStorage`](super::CacheStorage) on one SQLite database.
///
/// Queries run on tokio-rusqlite's background thread.
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    pub(crate) conn: Connection,
}

impl SqliteStorage {
    /// Open (or create) the database file and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!(path = %path.display(), "opening cache database");
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Ephemeral database, mostly for tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Schema version currently applied to the database.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| migrations::current_version(conn))
            .await
            .map_err(Error::from)
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await.map_err(Error::Database)?;
        migrations::run(&conn).await?;
        Ok(Self { conn })
    }
}
