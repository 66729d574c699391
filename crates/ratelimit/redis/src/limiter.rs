use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, warn};

use relay_core::Clock;
use relay_ratelimit::error::RateLimitError;
use relay_ratelimit::key::quota_key;
use relay_ratelimit::limiter::{DailyLimits, Direction, RateLimiter};

use crate::config::RedisConfig;

/// Redis-backed implementation of [`RateLimiter`].
///
/// Uses a shared `deadpool-redis` pool. Day rollover needs no cleanup: each
/// counter key embeds the UTC day and carries a one-day TTL.
pub struct RedisRateLimiter {
    pool: Pool,
    prefix: String,
    ttl_secs: i64,
    limits: DailyLimits,
    clock: Arc<dyn Clock>,
}

impl RedisRateLimiter {
    /// Create a new `RedisRateLimiter` from the provided configuration.
    ///
    /// The pool connects lazily; an unreachable server shows up on the first
    /// call or through [`RateLimiter::is_live`].
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Configuration`] if the pool cannot be created.
    pub fn new(
        config: &RedisConfig,
        limits: DailyLimits,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RateLimitError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| RateLimitError::Configuration(e.to_string()))?
            .map_err(|e| RateLimitError::Configuration(e.to_string()))?;

        Ok(Self {
            pool,
            prefix: config.prefix.clone(),
            ttl_secs: i64::try_from(config.key_ttl.as_secs()).unwrap_or(i64::MAX),
            limits,
            clock,
        })
    }

    /// Build the full Redis key for one counter.
    fn counter_key(&self, direction: Direction, client: &str) -> String {
        format!(
            "{}:{}:{}",
            self.prefix,
            quota_key(self.clock.now(), client),
            direction.as_str()
        )
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, RateLimitError> {
        self.pool
            .get()
            .await
            .map_err(|e| RateLimitError::BackendUnavailable(e.to_string()))
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn count(&self, direction: Direction, client: &str) -> Result<u64, RateLimitError> {
        let key = self.counter_key(direction, client);
        let mut conn = self.conn().await?;

        let value: Option<u64> = conn
            .get(&key)
            .await
            .map_err(|e| RateLimitError::BackendUnavailable(e.to_string()))?;

        Ok(value.unwrap_or(0))
    }

    async fn record(&self, direction: Direction, client: &str) -> Result<(), RateLimitError> {
        let key = self.counter_key(direction, client);
        let mut conn = self.conn().await?;

        // INCR + EXPIRE in one MULTI so a counter never exists without a TTL.
        redis::pipe()
            .atomic()
            .incr(&key, 1)
            .ignore()
            .expire(&key, self.ttl_secs)
            .ignore()
            .exec_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::BackendUnavailable(e.to_string()))?;

        debug!(key = %key, "quota counter incremented");
        Ok(())
    }

    fn limits(&self) -> DailyLimits {
        self.limits
    }

    async fn reset(&self) -> Result<(), RateLimitError> {
        let pattern = format!("{}:*", self.prefix);
        let mut conn = self.conn().await?;
        let mut cursor = 0u64;
        let mut removed = 0usize;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| RateLimitError::BackendUnavailable(e.to_string()))?;

            if !keys.is_empty() {
                removed += keys.len();
                let () = conn
                    .del(&keys)
                    .await
                    .map_err(|e| RateLimitError::BackendUnavailable(e.to_string()))?;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix = %self.prefix, removed, "quota counters reset");
        Ok(())
    }

    async fn is_live(&self) -> bool {
        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "redis rate limiter unreachable");
                return false;
            }
        };
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "redis rate limiter ping failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_core::ManualClock;

    use super::*;

    #[tokio::test]
    async fn counter_keys_embed_day_client_and_direction() {
        use chrono::TimeZone;

        let clock = Arc::new(ManualClock::new(
            chrono::Utc.with_ymd_and_hms(2024, 5, 17, 8, 0, 0).unwrap(),
        ));
        let limiter = RedisRateLimiter::new(
            &RedisConfig::default(),
            DailyLimits::default(),
            clock as Arc<dyn Clock>,
        )
        .expect("pool creation should succeed");

        assert_eq!(
            limiter.counter_key(Direction::Upload, "10.1.2.3"),
            "relay:20240517:10.1.2.3:uploads"
        );
        assert_eq!(
            limiter.counter_key(Direction::Download, "10.1.2.3"),
            "relay:20240517:10.1.2.3:downloads"
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_not_live() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".into(),
            connection_timeout: std::time::Duration::from_millis(200),
            ..RedisConfig::default()
        };
        let limiter = RedisRateLimiter::new(
            &config,
            DailyLimits::default(),
            Arc::new(ManualClock::starting_now()),
        )
        .expect("pool creation should succeed");

        assert!(!limiter.is_live().await);
        assert!(matches!(
            limiter.can_upload("a").await,
            Err(RateLimitError::BackendUnavailable(_))
        ));
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use relay_core::ManualClock;

    use super::*;

    fn test_config() -> RedisConfig {
        RedisConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            prefix: format!("relay-test-{}", uuid::Uuid::new_v4()),
            ..RedisConfig::default()
        }
    }

    #[tokio::test]
    async fn limiter_conformance() {
        let clock = Arc::new(ManualClock::starting_now());
        let limiter = RedisRateLimiter::new(
            &test_config(),
            DailyLimits::new(3, 4),
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .expect("pool creation should succeed");
        assert!(limiter.is_live().await);
        relay_ratelimit::testing::run_limiter_conformance_tests(&limiter, &clock)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn counters_carry_a_ttl() {
        let clock = Arc::new(ManualClock::starting_now());
        let limiter = RedisRateLimiter::new(
            &test_config(),
            DailyLimits::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .expect("pool creation should succeed");

        limiter.record_upload("ttl-client").await.unwrap();
        let key = limiter.counter_key(Direction::Upload, "ttl-client");
        let mut conn = limiter.conn().await.unwrap();
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!(ttl > 0 && ttl <= 86_400, "unexpected ttl {ttl}");

        limiter.reset().await.unwrap();
    }
}
