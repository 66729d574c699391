mod limiter;

pub use limiter::MemoryRateLimiter;
