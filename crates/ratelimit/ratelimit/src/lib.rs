pub mod error;
pub mod key;
pub mod limiter;
pub mod testing;

pub use error::RateLimitError;
pub use key::{day_stamp, quota_key};
pub use limiter::{DailyLimits, Direction, QuotaUsage, RateLimiter};
