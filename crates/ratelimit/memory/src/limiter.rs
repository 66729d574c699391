use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use relay_core::Clock;
use relay_ratelimit::error::RateLimitError;
use relay_ratelimit::key::{day_stamp, quota_key};
use relay_ratelimit::limiter::{DailyLimits, Direction, QuotaUsage, RateLimiter};

/// In-memory [`RateLimiter`] backed by a [`DashMap`].
///
/// Counters live under `<YYYYMMDD>:<client>` keys. Entries for past days are
/// never read again but stay in the map until [`prune_previous_days`] or
/// [`RateLimiter::reset`] is called.
///
/// [`prune_previous_days`]: MemoryRateLimiter::prune_previous_days
#[derive(Debug)]
pub struct MemoryRateLimiter {
    counters: DashMap<String, QuotaUsage>,
    limits: DailyLimits,
    clock: Arc<dyn Clock>,
}

impl MemoryRateLimiter {
    /// Create an empty limiter enforcing `limits`.
    pub fn new(limits: DailyLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            limits,
            clock,
        }
    }

    fn key(&self, client: &str) -> String {
        quota_key(self.clock.now(), client)
    }

    /// Drop counters that belong to any day other than the current one.
    /// Returns the number of entries removed.
    pub fn prune_previous_days(&self) -> usize {
        let today = format!("{}:", day_stamp(self.clock.now()));
        let before = self.counters.len();
        self.counters.retain(|key, _| key.starts_with(&today));
        before.saturating_sub(self.counters.len())
    }

    /// Number of counter entries currently held.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn count(&self, direction: Direction, client: &str) -> Result<u64, RateLimitError> {
        Ok(self
            .counters
            .get(&self.key(client))
            .map_or(0, |usage| usage.get(direction)))
    }

    async fn record(&self, direction: Direction, client: &str) -> Result<(), RateLimitError> {
        // The entry guard holds the shard lock, so the increment is atomic per key.
        self.counters
            .entry(self.key(client))
            .or_default()
            .bump(direction);
        Ok(())
    }

    fn limits(&self) -> DailyLimits {
        self.limits
    }

    async fn reset(&self) -> Result<(), RateLimitError> {
        self.counters.clear();
        Ok(())
    }

    async fn is_live(&self) -> bool {
        true
    }
}
