use std::time::Duration;

/// Configuration for the Redis rate limiter backend.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`).
    pub url: String,

    /// Key prefix applied to every counter key.
    pub prefix: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,

    /// Lifetime of a counter key, refreshed on every increment.
    pub key_ttl: Duration,
}

impl RedisConfig {
    /// Default configuration pointed at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            prefix: String::from("relay"),
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
            key_ttl: Duration::from_secs(86_400),
        }
    }
}
