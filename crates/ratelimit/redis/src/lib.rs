//! Redis rate limiter backend for relay.
//!
//! Counters are plain Redis integers named
//! `{prefix}:{YYYYMMDD}:{client}:{uploads|downloads}`. Every increment is sent
//! as a `MULTI`/`EXEC` pipeline of `INCR` followed by `EXPIRE`, so a counter
//! can never outlive its day by more than the TTL, even if the process dies
//! between the two commands.
//!
//! # Example
//!
//! ```ignore
//! use relay_ratelimit_redis::{RedisConfig, RedisRateLimiter};
//!
//! let config = RedisConfig::new("redis://localhost:6379");
//! let limiter = RedisRateLimiter::new(&config, DailyLimits::default(), clock)?;
//! ```

mod config;
mod limiter;

pub use config::RedisConfig;
pub use limiter::RedisRateLimiter;
