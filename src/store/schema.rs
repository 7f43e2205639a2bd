//! SQLite DDL for the registry and the source cache.

use rusqlite::Connection;

/// Bumped when a table changes shape.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Researchers known to this instance.
CREATE TABLE IF NOT EXISTS researchers (
    slug         TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    identifiers  TEXT NOT NULL DEFAULT '{}',  -- JSON object: source -> identifier
    active       INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- One source payload per (source, researcher, scope). Last writer wins.
CREATE TABLE IF NOT EXISTS cache_entries (
    source     TEXT NOT NULL,
    researcher TEXT NOT NULL,
    scope      TEXT NOT NULL,
    payload    TEXT NOT NULL,             -- JSON SourceData
    fetched_at INTEGER NOT NULL,          -- unix seconds
    ttl_secs   INTEGER NOT NULL,
    PRIMARY KEY (source, researcher, scope)
);

CREATE INDEX IF NOT EXISTS idx_cache_researcher ON cache_entries(researcher);
"#;

/// Apply the full schema to an open connection and stamp the version.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Returns `None` if the version row is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
