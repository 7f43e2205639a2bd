//! Researcher registry on the `researchers` table.
//!
//! Maps an opaque slug to a display name and the identifier used at each
//! source. Only active researchers are visible to lookups and listings.

use std::collections::BTreeMap;

use rusqlite::{OptionalExtension, params};
use twin_core::{ResearcherRecord, SourceKind};

use super::Database;
use crate::error::StoreError;

/// Longest accepted slug.
pub const MAX_SLUG_LEN: usize = 128;

/// Check a slug: 2 to 128 lower-case letters, digits, `-` or `_`, starting
/// and ending with a letter or digit.
///
/// # Errors
///
/// Returns [`StoreError::InvalidSlug`] describing the first violation.
pub fn validate_slug(slug: &str) -> Result<(), StoreError> {
    let len = slug.chars().count();
    if !(2..=MAX_SLUG_LEN).contains(&len) {
        return Err(StoreError::InvalidSlug(format!(
            "slug must be 2-{MAX_SLUG_LEN} characters"
        )));
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !edge_ok(slug.chars().next()) || !edge_ok(slug.chars().last()) {
        return Err(StoreError::InvalidSlug(
            "slug must start and end with a lower-case letter or digit".into(),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(StoreError::InvalidSlug(
            "slug may contain only a-z, 0-9, '-' and '_'".into(),
        ));
    }
    Ok(())
}

/// The researcher inserted into an empty registry.
pub fn seed_record() -> ResearcherRecord {
    ResearcherRecord::new("martin-frasch", "Martin Frasch")
        .with_identifier(SourceKind::SemanticScholar, "4019392")
        .with_identifier(SourceKind::GoogleScholar, "3lacmuYAAAAJ")
        .with_identifier(SourceKind::GitHub, "martinfrasch")
        .with_identifier(SourceKind::Figshare, "Martin Frasch")
        .with_identifier(SourceKind::Affiliations, "0000-0003-3159-6321")
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_record((slug, display_name, identifiers): (String, String, String)) -> Result<ResearcherRecord, StoreError> {
    let identifiers: BTreeMap<SourceKind, String> = serde_json::from_str(&identifiers)?;
    Ok(ResearcherRecord {
        key: slug,
        display_name,
        identifiers,
    })
}

/// Registry of researchers known to this instance.
#[derive(Clone)]
pub struct ResearcherRegistry {
    db: Database,
}

impl ResearcherRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert [`seed_record`] if the registry is empty. Returns whether a
    /// row was inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database failure.
    pub async fn seed_if_empty(&self) -> Result<bool, StoreError> {
        let count = self
            .db
            .run(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM researchers", [], |r| r.get::<_, i64>(0))?))
            .await?;
        if count > 0 {
            return Ok(false);
        }
        let seed = seed_record();
        tracing::info!(slug = %seed.key, "seeding empty researcher registry");
        self.upsert(&seed).await?;
        Ok(true)
    }

    /// Active researcher by slug.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSlug`] for a malformed slug, or a
    /// database error.
    pub async fn get(&self, slug: &str) -> Result<Option<ResearcherRecord>, StoreError> {
        validate_slug(slug)?;
        let slug = slug.to_owned();
        let row = self
            .db
            .run(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT slug, display_name, identifiers FROM researchers
                         WHERE slug = ?1 AND active = 1",
                        params![slug],
                        row_to_record,
                    )
                    .optional()?)
            })
            .await?;
        row.map(into_record).transpose()
    }

    /// Every active researcher, ordered by slug.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database failure.
    pub async fn list(&self) -> Result<Vec<ResearcherRecord>, StoreError> {
        let rows = self
            .db
            .run(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT slug, display_name, identifiers FROM researchers
                     WHERE active = 1 ORDER BY slug",
                )?;
                let rows = stmt
                    .query_map([], row_to_record)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(into_record).collect()
    }

    /// Insert or update a researcher; an update re-activates it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSlug`] for a malformed slug, or a
    /// database error.
    pub async fn upsert(&self, record: &ResearcherRecord) -> Result<(), StoreError> {
        validate_slug(&record.key)?;
        let identifiers = serde_json::to_string(&record.identifiers)?;
        let slug = record.key.clone();
        let display_name = record.display_name.clone();
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO researchers (slug, display_name, identifiers, active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?4)
                     ON CONFLICT(slug) DO UPDATE SET
                         display_name = excluded.display_name,
                         identifiers  = excluded.identifiers,
                         active       = 1,
                         updated_at   = excluded.updated_at",
                    params![slug, display_name, identifiers, now],
                )?;
                Ok(())
            })
            .await
    }

    /// Hide or restore a researcher. Returns whether the slug existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database failure.
    pub async fn set_active(&self, slug: &str, active: bool) -> Result<bool, StoreError> {
        validate_slug(slug)?;
        let slug = slug.to_owned();
        let now = chrono::Utc::now().to_rfc3339();
        let changed = self
            .db
            .run(move |conn| {
                Ok(conn.execute(
                    "UPDATE researchers SET active = ?2, updated_at = ?3 WHERE slug = ?1",
                    params![slug, active, now],
                )?)
            })
            .await?;
        Ok(changed > 0)
    }
}
