//! Cache store and entry operations for the SQLite backend.

use async_trait::async_trait;
use tokio_rusqlite::rusqlite::{self, Connection, OptionalExtension};
use tokio_rusqlite::params;

use super::CacheStorage;
use super::connection::SqliteStorage;
use crate::Error;
use crate::request::{RequestKey, Response};

/// Insert the store row if missing and return its id.
fn ensure_cache(conn: &Connection, name: &str) -> Result<i64, Error> {
    conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    let id = conn.query_row("SELECT id FROM caches WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(id)
}

fn row_to_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode((status, headers_json, body): (i64, String, Vec<u8>)) -> Result<Response, Error> {
    let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status out of range: {status}")))?;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
    Ok(Response::new(status, headers, body))
}

#[async_trait]
impl CacheStorage for SqliteStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_cache(conn, &name)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let name = name.to_string();
        let digest = key.digest();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.status, e.headers_json, e.body
                         FROM entries e JOIN caches c ON c.id = e.cache_id
                         WHERE c.name = ?1 AND e.key_hash = ?2",
                        params![name, digest],
                        row_to_response,
                    )
                    .optional()?;
                row.map(decode).transpose()
            })
            .await
            .map_err(Error::from)
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        let digest = key.digest();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.status, e.headers_json, e.body
                         FROM entries e JOIN caches c ON c.id = e.cache_id
                         WHERE e.key_hash = ?1
                         ORDER BY c.id ASC LIMIT 1",
                        params![digest],
                        row_to_response,
                    )
                    .optional()?;
                row.map(decode).transpose()
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &str, key: &RequestKey, response: Response) -> Result<(), Error> {
        let name = name.to_string();
        let key = key.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let cache_id = ensure_cache(conn, &name)?;
                conn.execute(
                    "INSERT INTO entries (cache_id, key_hash, method, url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(cache_id, key_hash) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        cache_id,
                        key.digest(),
                        &key.method,
                        &key.url,
                        response.status as i64,
                        headers_json,
                        response.body.as_ref(),
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM entries WHERE cache_id IN (SELECT id FROM caches WHERE name = ?1)",
                    params![name],
                )?;
                let deleted = tx.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn entry_count(&self, name: &str) -> Result<usize, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries e JOIN caches c ON c.id = e.cache_id WHERE c.name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}
