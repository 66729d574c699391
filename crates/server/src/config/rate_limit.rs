use relay_ratelimit::DailyLimits;
use serde::Deserialize;

/// What the service does when the rate limiter backend cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnBackendError {
    /// Let the request through.
    #[default]
    Allow,
    /// Refuse the request as unavailable.
    Deny,
}

/// Daily quota configuration.
#[derive(Debug, Deserialize)]
pub struct RateLimitConfig {
    /// Backend selector: `"in-memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_max_daily_uploads")]
    pub max_daily_uploads: u64,
    #[serde(default = "default_max_daily_downloads")]
    pub max_daily_downloads: u64,
    /// Redis connection URL.
    pub url: Option<String>,
    /// Redis key prefix. Defaults to `"relay"`.
    pub prefix: Option<String>,
    #[serde(default)]
    pub on_backend_error: OnBackendError,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            max_daily_uploads: default_max_daily_uploads(),
            max_daily_downloads: default_max_daily_downloads(),
            url: None,
            prefix: None,
            on_backend_error: OnBackendError::default(),
        }
    }
}

impl RateLimitConfig {
    pub fn limits(&self) -> DailyLimits {
        DailyLimits::new(self.max_daily_uploads, self.max_daily_downloads)
    }
}

fn default_provider() -> String {
    "in-memory".to_owned()
}

fn default_max_daily_uploads() -> u64 {
    5
}

fn default_max_daily_downloads() -> u64 {
    25
}
