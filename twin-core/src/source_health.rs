//! Per-source health: a transient-failure circuit breaker and a ledger of
//! permanent failures.
//!
//! The breaker tracks consecutive transient failures per source and
//! temporarily stops contacting a source that keeps failing. After a
//! cooldown, a single probe decides whether to restore or re-trip it.
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure             │
//!     └─────────────────────────┴──────────────────────┘
//! ```
//!
//! The ledger records permanent failures per (source, researcher,
//! identifier). While recorded, the source is not contacted for that
//! researcher. A changed identifier no longer matches the record, so fixing
//! the configuration clears it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::BreakerSettings;
use crate::types::SourceKind;

/// Breaker state for a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests are allowed through.
    Closed,
    /// Too many consecutive transient failures; requests are skipped until
    /// the cooldown expires.
    Open,
    /// Cooldown has elapsed; the next request is a probe.
    HalfOpen,
}

#[derive(Debug, Clone)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PermanentFailure {
    identifier: String,
    reason: String,
}

#[derive(Debug, Default)]
struct HealthState {
    breakers: HashMap<SourceKind, Breaker>,
    permanent: HashMap<(SourceKind, String), PermanentFailure>,
}

/// Shared source health, safe to use from concurrent fetch tasks.
#[derive(Debug)]
pub struct SourceHealth {
    settings: BreakerSettings,
    state: Mutex<HealthState>,
}

impl SourceHealth {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(HealthState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `source` may be contacted now.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and
    /// allows the probe.
    pub fn should_attempt(&self, source: SourceKind) -> bool {
        let cooldown = Duration::from_secs(self.settings.cooldown_secs);
        let mut state = self.lock();
        let breaker = state.breakers.entry(source).or_default();
        match breaker.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = breaker
                    .last_failure_at
                    .is_none_or(|t| t.elapsed() >= cooldown);
                if cooled {
                    breaker.state = CircuitState::HalfOpen;
                }
                cooled
            }
        }
    }

    /// Record a successful fetch; closes the breaker.
    pub fn record_success(&self, source: SourceKind) {
        let mut state = self.lock();
        let breaker = state.breakers.entry(source).or_default();
        breaker.state = CircuitState::Closed;
        breaker.consecutive_failures = 0;
    }

    /// Record a transient failure (including rate-limit rejections).
    pub fn record_transient(&self, source: SourceKind) {
        let threshold = self.settings.failure_threshold;
        let mut state = self.lock();
        let breaker = state.breakers.entry(source).or_default();
        breaker.consecutive_failures = breaker.consecutive_failures.saturating_add(1);
        breaker.last_failure_at = Some(Instant::now());
        if breaker.state == CircuitState::HalfOpen || breaker.consecutive_failures >= threshold {
            if breaker.state != CircuitState::Open {
                tracing::warn!(source = %source, failures = breaker.consecutive_failures, "source circuit opened");
            }
            breaker.state = CircuitState::Open;
        }
    }

    pub fn circuit_state(&self, source: SourceKind) -> CircuitState {
        self.lock()
            .breakers
            .get(&source)
            .map_or(CircuitState::Closed, |b| b.state)
    }

    /// Record a permanent failure for `researcher` at `source` under
    /// `identifier`.
    pub fn record_permanent(
        &self,
        source: SourceKind,
        researcher: &str,
        identifier: &str,
        reason: &str,
    ) {
        self.lock().permanent.insert(
            (source, researcher.to_string()),
            PermanentFailure {
                identifier: identifier.to_string(),
                reason: reason.to_string(),
            },
        );
    }

    /// The recorded permanent failure reason, if `identifier` is still the
    /// one that failed.
    pub fn permanent_failure(
        &self,
        source: SourceKind,
        researcher: &str,
        identifier: &str,
    ) -> Option<String> {
        self.lock()
            .permanent
            .get(&(source, researcher.to_string()))
            .filter(|f| f.identifier == identifier)
            .map(|f| f.reason.clone())
    }

    /// Forget a permanent failure, e.g. after an operator fixed the upstream
    /// record without changing the identifier.
    pub fn clear_permanent(&self, source: SourceKind, researcher: &str) {
        self.lock().permanent.remove(&(source, researcher.to_string()));
    }
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(threshold: u32, cooldown_secs: u64) -> SourceHealth {
        SourceHealth::new(BreakerSettings {
            failure_threshold: threshold,
            cooldown_secs,
        })
    }

    #[test]
    fn unseen_sources_are_closed() {
        let h = health(3, 60);
        assert_eq!(h.circuit_state(SourceKind::GitHub), CircuitState::Closed);
        assert!(h.should_attempt(SourceKind::GitHub));
    }

    #[test]
    fn trips_open_at_threshold_and_blocks() {
        let h = health(3, 600);
        h.record_transient(SourceKind::GoogleScholar);
        h.record_transient(SourceKind::GoogleScholar);
        assert_eq!(h.circuit_state(SourceKind::GoogleScholar), CircuitState::Closed);
        h.record_transient(SourceKind::GoogleScholar);
        assert_eq!(h.circuit_state(SourceKind::GoogleScholar), CircuitState::Open);
        assert!(!h.should_attempt(SourceKind::GoogleScholar));
        // Other sources unaffected.
        assert!(h.should_attempt(SourceKind::SemanticScholar));
    }

    #[test]
    fn cooldown_allows_probe_and_success_closes() {
        let h = health(1, 0);
        h.record_transient(SourceKind::Figshare);
        assert!(h.should_attempt(SourceKind::Figshare));
        assert_eq!(h.circuit_state(SourceKind::Figshare), CircuitState::HalfOpen);
        h.record_success(SourceKind::Figshare);
        assert_eq!(h.circuit_state(SourceKind::Figshare), CircuitState::Closed);
    }

    #[test]
    fn failed_probe_retrips() {
        let h = health(5, 0);
        for _ in 0..5 {
            h.record_transient(SourceKind::GitHub);
        }
        assert!(h.should_attempt(SourceKind::GitHub));
        h.record_success(SourceKind::GitHub);
        for _ in 0..5 {
            h.record_transient(SourceKind::GitHub);
        }
        assert!(h.should_attempt(SourceKind::GitHub));
        assert_eq!(h.circuit_state(SourceKind::GitHub), CircuitState::HalfOpen);
        h.record_transient(SourceKind::GitHub);
        assert_eq!(h.circuit_state(SourceKind::GitHub), CircuitState::Open);
    }

    #[test]
    fn success_resets_failure_run() {
        let h = health(3, 600);
        for _ in 0..10 {
            h.record_transient(SourceKind::GitHub);
            h.record_transient(SourceKind::GitHub);
            h.record_success(SourceKind::GitHub);
        }
        assert_eq!(h.circuit_state(SourceKind::GitHub), CircuitState::Closed);
    }

    #[test]
    fn permanent_failure_is_keyed_by_identifier() {
        let h = SourceHealth::default();
        h.record_permanent(SourceKind::GitHub, "jane", "janedoe", "HTTP 404");

        assert_eq!(
            h.permanent_failure(SourceKind::GitHub, "jane", "janedoe").as_deref(),
            Some("HTTP 404")
        );
        // A corrected identifier is not blocked.
        assert!(h.permanent_failure(SourceKind::GitHub, "jane", "jane-doe").is_none());
        // Other researchers and sources are not blocked.
        assert!(h.permanent_failure(SourceKind::GitHub, "john", "janedoe").is_none());
        assert!(h.permanent_failure(SourceKind::Figshare, "jane", "janedoe").is_none());

        h.clear_permanent(SourceKind::GitHub, "jane");
        assert!(h.permanent_failure(SourceKind::GitHub, "jane", "janedoe").is_none());
    }
}
