//! Cache store abstraction and the in-process implementation.
//!
//! Entries hold one source's normalised payload for one researcher. A lookup
//! is a three-state [`CacheLookup`]: an entry older than its TTL is still
//! returned, tagged stale, so callers can fall back to it when a refresh
//! fails.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::types::{SourceData, SourceKind, TtlClass};

/// Default maximum number of entries held by [`MemoryCacheStore`].
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

/// Scope prefix for the whole-profile payload of a source.
pub const PROFILE_SCOPE: &str = "profile";

/// Composite cache key: source + researcher + artifact-or-profile scope.
///
/// Different researchers never share a key, so concurrent aggregations for
/// different researchers never contend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub source: SourceKind,
    pub researcher: String,
    pub scope: String,
}

impl CacheKey {
    pub fn new(source: SourceKind, researcher: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            source,
            researcher: researcher.into(),
            scope: scope.into(),
        }
    }

    /// Key for a source's full payload for one researcher, fetched under
    /// `identifier`. A changed identifier never reads the old payload.
    pub fn profile(source: SourceKind, researcher: impl Into<String>, identifier: &str) -> Self {
        Self::new(source, researcher, format!("{PROFILE_SCOPE}:{identifier}"))
    }
}

/// A cached payload with its fetch time and lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: SourceData,
    /// Unix seconds.
    pub fetched_at: i64,
    pub ttl_secs: u64,
}

impl CacheEntry {
    /// Whether the entry is younger than its TTL at `now` (unix seconds).
    pub fn is_fresh_at(&self, now: i64) -> bool {
        let age = now.saturating_sub(self.fetched_at);
        age < i64::try_from(self.ttl_secs).unwrap_or(i64::MAX)
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Younger than its TTL.
    Fresh(CacheEntry),
    /// Older than its TTL; usable only as a fallback and always reported
    /// as stale.
    Stale(CacheEntry),
    Miss,
}

impl CacheLookup {
    /// Classify a loaded entry against `now`.
    pub fn classify(entry: Option<CacheEntry>, now: i64) -> Self {
        match entry {
            Some(e) if e.is_fresh_at(now) => Self::Fresh(e),
            Some(e) => Self::Stale(e),
            None => Self::Miss,
        }
    }

    /// The entry, whether fresh or stale.
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            Self::Fresh(e) | Self::Stale(e) => Some(e),
            Self::Miss => None,
        }
    }

    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Self::Fresh(e) | Self::Stale(e) => Some(e),
            Self::Miss => None,
        }
    }
}

/// Storage backend for source payloads.
///
/// Backends only load, store and remove raw entries; freshness is decided by
/// the provided [`get`](CacheStore::get). Writes to the same key are
/// last-writer-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load the entry for `key`, regardless of age.
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or overwrite an entry.
    async fn store(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove the entry for `key`, if any.
    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Look up `key` as of the current wall-clock time.
    async fn get(&self, key: &CacheKey) -> Result<CacheLookup, CacheError> {
        let entry = self.load(key).await?;
        Ok(CacheLookup::classify(entry, now_epoch_secs()))
    }

    /// Store a freshly fetched payload under `key` with the lifetime of
    /// `ttl`.
    async fn put(&self, key: CacheKey, payload: SourceData, ttl: TtlClass) -> Result<(), CacheError> {
        self.store(CacheEntry {
            key,
            payload,
            fetched_at: now_epoch_secs(),
            ttl_secs: ttl.ttl_secs(),
        })
        .await
    }
}

/// Current time in unix seconds.
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// In-process cache store backed by [`moka`].
///
/// Capacity-bounded with no time-based eviction: expiry is a freshness
/// decision, and stale entries must stay servable as fallbacks.
#[derive(Clone)]
pub struct MemoryCacheStore {
    entries: Cache<CacheKey, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_entries).build(),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(key).await)
    }

    async fn store(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(entry.key.clone(), entry).await;
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.entries.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Artifact, Reuse};

    fn payload(title: &str) -> SourceData {
        SourceData {
            artifacts: vec![Artifact::new(
                SourceKind::GitHub,
                format!("gh:jane/{title}"),
                title,
                Reuse::Repository { stars: 1, forks: 0 },
            )],
            ..Default::default()
        }
    }

    fn entry_aged(key: CacheKey, age_secs: i64, ttl: TtlClass) -> CacheEntry {
        CacheEntry {
            key,
            payload: payload("tool"),
            fetched_at: now_epoch_secs() - age_secs,
            ttl_secs: ttl.ttl_secs(),
        }
    }

    #[test]
    fn cache_key_separates_researchers_and_sources() {
        let a = CacheKey::profile(SourceKind::GitHub, "jane", "janedoe");
        let b = CacheKey::profile(SourceKind::GitHub, "john", "janedoe");
        let c = CacheKey::profile(SourceKind::Figshare, "jane", "janedoe");
        let d = CacheKey::profile(SourceKind::GitHub, "jane", "janedoe2");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a, CacheKey::new(SourceKind::GitHub, "jane", "profile:janedoe"));
    }

    #[test]
    fn classify_by_age() {
        let key = CacheKey::profile(SourceKind::GitHub, "jane", "janedoe");
        let now = 1_000_000;
        let entry = CacheEntry {
            key,
            payload: SourceData::default(),
            fetched_at: now - 100,
            ttl_secs: 100,
        };
        assert!(matches!(
            CacheLookup::classify(Some(entry.clone()), now - 1),
            CacheLookup::Fresh(_)
        ));
        // Exactly TTL old is no longer fresh.
        assert!(matches!(
            CacheLookup::classify(Some(entry), now),
            CacheLookup::Stale(_)
        ));
        assert_eq!(CacheLookup::classify(None, now), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn miss_then_put_then_fresh() {
        let store = MemoryCacheStore::default();
        let key = CacheKey::profile(SourceKind::GitHub, "jane", "janedoe");
        assert_eq!(store.get(&key).await.expect("get"), CacheLookup::Miss);

        store
            .put(key.clone(), payload("tool"), TtlClass::General)
            .await
            .expect("put");

        match store.get(&key).await.expect("get") {
            CacheLookup::Fresh(entry) => {
                assert_eq!(entry.payload, payload("tool"));
                assert_eq!(entry.ttl_secs, 86_400);
            }
            other => panic!("expected fresh entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_entry_is_returned_stale() {
        let store = MemoryCacheStore::default();
        let key = CacheKey::profile(SourceKind::GoogleScholar, "jane", "janedoe");
        store
            .store(entry_aged(key.clone(), 3 * 86_400, TtlClass::SecondaryPublications))
            .await
            .expect("store");

        let lookup = store.get(&key).await.expect("get");
        assert!(matches!(lookup, CacheLookup::Stale(_)));
        assert_eq!(lookup.entry().map(|e| e.payload.artifacts.len()), Some(1));
    }

    #[tokio::test]
    async fn affiliation_entries_stay_fresh_for_weeks() {
        let store = MemoryCacheStore::default();
        let key = CacheKey::profile(SourceKind::Affiliations, "jane", "janedoe");
        store
            .store(entry_aged(key.clone(), 20 * 86_400, TtlClass::Affiliation))
            .await
            .expect("store");
        assert!(matches!(
            store.get(&key).await.expect("get"),
            CacheLookup::Fresh(_)
        ));
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let store = MemoryCacheStore::default();
        let key = CacheKey::profile(SourceKind::GitHub, "jane", "janedoe");
        store
            .put(key.clone(), payload("first"), TtlClass::General)
            .await
            .expect("put");
        store
            .put(key.clone(), payload("second"), TtlClass::General)
            .await
            .expect("put");

        let entry = store.get(&key).await.expect("get").into_entry().expect("entry");
        assert_eq!(entry.payload.artifacts[0].title, "second");
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let store = MemoryCacheStore::default();
        let key = CacheKey::profile(SourceKind::Figshare, "jane", "janedoe");
        store
            .put(key.clone(), payload("data"), TtlClass::General)
            .await
            .expect("put");
        store.invalidate(&key).await.expect("invalidate");
        assert_eq!(store.get(&key).await.expect("get"), CacheLookup::Miss);
    }
}
