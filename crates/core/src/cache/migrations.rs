//! Schema migrations for the cache store database.
//!
//! Each step runs in its own transaction together with the `_migrations`
//! row that records it, so a failed batch leaves neither a half-built
//! schema nor a version bump behind.

use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

/// One schema step.
pub(crate) struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Ordered by version; never edit a step once released, append a new one.
pub(crate) const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "cache_storage",
    sql: include_str!("../../migrations/001_cache_storage.sql"),
}];

/// Newest schema version this build can open.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Bring the schema up to [`latest_version`].
///
/// # Errors
///
/// `MigrationFailed` if a step fails or the database was written by a
/// newer build.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| apply(conn, MIGRATIONS)).await.map_err(Error::from)
}

/// Highest applied version, 0 for a fresh database.
pub(crate) fn current_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?)
}

fn apply(conn: &mut rusqlite::Connection, migrations: &[Migration]) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current = current_version(conn)?;
    let known = migrations.last().map_or(0, |m| m.version);
    if current > known {
        return Err(Error::MigrationFailed(format!(
            "database schema v{current} is newer than this build (v{known})"
        )));
    }

    for migration in migrations.iter().filter(|m| m.version > current) {
        tracing::debug!(version = migration.version, name = migration.name, "applying cache storage migration");

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| Error::MigrationFailed(format!("{} (v{}): {e}", migration.name, migration.version)))?;
        tx.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
    }

    Ok(())
}
