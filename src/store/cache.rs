//! Durable source cache on the `cache_entries` table.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use twin_core::{CacheEntry, CacheError, CacheKey, CacheStore, SourceKind};

use super::Database;
use crate::error::StoreError;

/// [`CacheStore`] backed by SQLite. Writes replace the whole row, so
/// concurrent writers for one key converge on the last write.
#[derive(Clone)]
pub struct SqliteCacheStore {
    db: Database,
}

impl SqliteCacheStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Drop every cached payload for one researcher.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database failure.
    pub async fn invalidate_researcher(&self, researcher: &str) -> Result<usize, StoreError> {
        let researcher = researcher.to_owned();
        self.db
            .run(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM cache_entries WHERE researcher = ?1",
                    params![researcher],
                )?)
            })
            .await
    }
}

fn backend(e: StoreError) -> CacheError {
    match e {
        StoreError::Payload(e) => CacheError::Payload(e),
        other => CacheError::Backend(other.to_string()),
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let key = key.clone();
        self.db
            .run(move |conn| {
                let row: Option<(String, i64, i64)> = conn
                    .query_row(
                        "SELECT payload, fetched_at, ttl_secs FROM cache_entries
                         WHERE source = ?1 AND researcher = ?2 AND scope = ?3",
                        params![key.source.name(), key.researcher, key.scope],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()?;
                let Some((payload, fetched_at, ttl_secs)) = row else {
                    return Ok(None);
                };
                Ok(Some(CacheEntry {
                    payload: serde_json::from_str(&payload)?,
                    fetched_at,
                    ttl_secs: u64::try_from(ttl_secs).unwrap_or(0),
                    key,
                }))
            })
            .await
            .map_err(backend)
    }

    async fn store(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let payload = serde_json::to_string(&entry.payload)?;
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO cache_entries
                     (source, researcher, scope, payload, fetched_at, ttl_secs)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        entry.key.source.name(),
                        entry.key.researcher,
                        entry.key.scope,
                        payload,
                        entry.fetched_at,
                        i64::try_from(entry.ttl_secs).unwrap_or(i64::MAX),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(backend)
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        let key = key.clone();
        self.db
            .run(move |conn| {
                conn.execute(
                    "DELETE FROM cache_entries
                     WHERE source = ?1 AND researcher = ?2 AND scope = ?3",
                    params![key.source.name(), key.researcher, key.scope],
                )?;
                Ok(())
            })
            .await
            .map_err(backend)
    }
}

/// Rows per source, for diagnostics.
///
/// # Errors
///
/// Returns [`StoreError`] on a database failure.
pub async fn entry_counts(db: &Database) -> Result<Vec<(SourceKind, u64)>, StoreError> {
    db.run(|conn| {
        let mut stmt =
            conn.prepare("SELECT source, COUNT(*) FROM cache_entries GROUP BY source ORDER BY source")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (name, count) = row?;
            if let Some(kind) = SourceKind::from_name(&name) {
                out.push((kind, u64::try_from(count).unwrap_or(0)));
            }
        }
        Ok(out)
    })
    .await
}
