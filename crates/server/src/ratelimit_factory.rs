use std::sync::{Arc, Weak};
use std::time::Duration;

use relay_core::Clock;
use relay_ratelimit::RateLimiter;
use relay_ratelimit_memory::MemoryRateLimiter;
#[cfg(feature = "redis")]
use relay_ratelimit_redis::{RedisConfig, RedisRateLimiter};
use tracing::{debug, info};

use crate::config::{RateLimitConfig, RateLimitProvider};
use crate::error::ServerError;

/// How often the in-memory limiter drops counters from previous days.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Create a rate limiter for the selected provider.
pub fn create_rate_limiter(
    provider: RateLimitProvider,
    config: &RateLimitConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn RateLimiter>, ServerError> {
    let limits = config.limits();
    let limiter: Arc<dyn RateLimiter> = match provider {
        RateLimitProvider::InMemory => {
            let limiter = Arc::new(MemoryRateLimiter::new(limits, clock));
            spawn_pruner(Arc::downgrade(&limiter));
            limiter
        }
        #[cfg(feature = "redis")]
        RateLimitProvider::Redis => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("redis rate limiter requires [rate_limit] url".into())
            })?;
            let mut redis_config = RedisConfig::new(url);
            if let Some(prefix) = &config.prefix {
                redis_config.prefix.clone_from(prefix);
            }
            let limiter = RedisRateLimiter::new(&redis_config, limits, clock)
                .map_err(|e| ServerError::Backend(format!("redis rate limiter: {e}")))?;
            Arc::new(limiter)
        }
        #[cfg(not(feature = "redis"))]
        RateLimitProvider::Redis => {
            return Err(ServerError::UnsupportedProvider {
                kind: "rate limit",
                value: "redis (is the feature enabled?)".into(),
            });
        }
    };

    info!(
        %provider,
        max_daily_uploads = limits.uploads,
        max_daily_downloads = limits.downloads,
        "rate limiter ready"
    );
    Ok(limiter)
}

/// Periodically prune stale day counters until the limiter is dropped.
fn spawn_pruner(limiter: Weak<MemoryRateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(limiter) = limiter.upgrade() else {
                break;
            };
            let removed = limiter.prune_previous_days();
            if removed > 0 {
                debug!(removed, "pruned stale rate limit counters");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use relay_core::ManualClock;

    use super::*;

    #[tokio::test]
    async fn builds_in_memory_limiter() {
        let config = RateLimitConfig::default();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let limiter = create_rate_limiter(RateLimitProvider::InMemory, &config, clock).unwrap();
        assert!(limiter.is_live().await);
        assert_eq!(limiter.limits().uploads, 5);
        assert!(limiter.can_upload("10.0.0.1").await.unwrap());
    }
}
