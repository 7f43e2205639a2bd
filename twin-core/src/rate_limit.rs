//! Per-source outbound request quotas.
//!
//! Each source gets a token bucket sized from its [`RateQuota`]. A request
//! that finds the bucket empty joins a bounded wait queue; when the queue is
//! full, or the wait exceeds `max_wait_ms`, the request is rejected with
//! [`RateLimited`] instead of blocking indefinitely.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{DefaultDirectRateLimiter, Quota};
use tokio::sync::Semaphore;

use crate::config::{AggregateConfig, RateQuota};
use crate::error::RateLimited;
use crate::types::SourceKind;

/// How a request was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A permit was available.
    Immediate,
    /// The request queued for this long before a permit freed up.
    Waited(Duration),
}

struct SourceLimiter {
    bucket: DefaultDirectRateLimiter,
    queue: Arc<Semaphore>,
    max_wait: Duration,
}

impl SourceLimiter {
    fn new(quota: &RateQuota) -> Self {
        let burst = NonZeroU32::new(quota.max_requests).unwrap_or(NonZeroU32::MIN);
        let window = Duration::from_secs(quota.window_secs.max(1));
        let period = window / burst.get();
        let governor_quota = Quota::with_period(period)
            .map(|q| q.allow_burst(burst))
            .unwrap_or_else(|| Quota::per_second(burst));
        Self {
            bucket: governor::RateLimiter::direct(governor_quota),
            queue: Arc::new(Semaphore::new(quota.max_queue)),
            max_wait: Duration::from_millis(quota.max_wait_ms),
        }
    }
}

/// Shared rate limiter for all sources.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct RateLimiter {
    limiters: HashMap<SourceKind, SourceLimiter>,
}

impl RateLimiter {
    /// Build limiters for every source kind using the effective quotas.
    pub fn from_config(config: &AggregateConfig) -> Self {
        let limiters = SourceKind::all()
            .iter()
            .map(|&kind| (kind, SourceLimiter::new(&config.quota_for(kind))))
            .collect();
        Self { limiters }
    }

    /// Acquire a permit for one outbound request to `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] when the wait queue is full or the bounded
    /// wait elapses first.
    pub async fn acquire(&self, kind: SourceKind) -> Result<Admission, RateLimited> {
        let Some(limiter) = self.limiters.get(&kind) else {
            return Ok(Admission::Immediate);
        };

        if limiter.bucket.check().is_ok() {
            return Ok(Admission::Immediate);
        }

        let Ok(_slot) = limiter.queue.clone().try_acquire_owned() else {
            tracing::debug!(source = %kind, "rate-limit queue full");
            return Err(RateLimited {
                source_kind: kind,
                reason: "wait queue full".into(),
            });
        };

        let started = Instant::now();
        match tokio::time::timeout(limiter.max_wait, limiter.bucket.until_ready()).await {
            Ok(()) => Ok(Admission::Waited(started.elapsed())),
            Err(_) => {
                tracing::debug!(source = %kind, "rate-limit wait exceeded");
                Err(RateLimited {
                    source_kind: kind,
                    reason: format!("no permit within {}ms", limiter.max_wait.as_millis()),
                })
            }
        }
    }
}
