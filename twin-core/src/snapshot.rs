//! Latest immutable profile per researcher.
//!
//! A rebuild publishes a whole new [`ResearcherProfile`] by swapping one
//! `Arc` under a short write lock. Readers clone the `Arc` and never see a
//! half-updated profile.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::profile::ResearcherProfile;

#[derive(Debug, Default)]
pub struct ProfileSnapshots {
    profiles: RwLock<HashMap<String, Arc<ResearcherProfile>>>,
}

impl ProfileSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ResearcherProfile>>> {
        self.profiles.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ResearcherProfile>>> {
        self.profiles.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Arc<ResearcherProfile>> {
        self.read().get(key).cloned()
    }

    /// Replace the profile for its researcher; returns the published `Arc`.
    pub fn publish(&self, profile: ResearcherProfile) -> Arc<ResearcherProfile> {
        let profile = Arc::new(profile);
        self.write().insert(profile.key.clone(), Arc::clone(&profile));
        profile
    }

    pub fn remove(&self, key: &str) -> Option<Arc<ResearcherProfile>> {
        self.write().remove(key)
    }

    /// Every published profile, ordered by key.
    pub fn all(&self) -> Vec<Arc<ResearcherProfile>> {
        let mut out: Vec<_> = self.read().values().cloned().collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
