use chrono::TimeDelta;
use relay_core::ManualClock;

use crate::error::RateLimitError;
use crate::limiter::{Direction, QuotaUsage, RateLimiter};

/// Run the full rate limiter conformance test suite.
///
/// `limiter` must be freshly constructed and read its time from `clock`.
/// The suite advances `clock` across day boundaries and finishes by calling
/// [`RateLimiter::reset`].
///
/// # Errors
///
/// Returns an error if the backend fails during any test.
pub async fn run_limiter_conformance_tests(
    limiter: &dyn RateLimiter,
    clock: &ManualClock,
) -> Result<(), RateLimitError> {
    test_fresh_client_is_allowed(limiter).await?;
    test_checks_do_not_mutate(limiter).await?;
    test_upload_quota_exhausts(limiter).await?;
    test_directions_are_independent(limiter).await?;
    test_clients_are_independent(limiter).await?;
    test_day_rollover(limiter, clock).await?;
    test_reset_clears_everything(limiter).await?;
    Ok(())
}

async fn exhaust(
    limiter: &dyn RateLimiter,
    direction: Direction,
    client: &str,
) -> Result<(), RateLimitError> {
    let max = limiter.limits().max(direction);
    for n in 0..max {
        assert!(
            limiter.allows(direction, client).await?,
            "{direction} #{} for {client} should be allowed",
            n + 1
        );
        limiter.record(direction, client).await?;
    }
    Ok(())
}

async fn test_fresh_client_is_allowed(limiter: &dyn RateLimiter) -> Result<(), RateLimitError> {
    let client = "198.51.100.1";
    assert!(limiter.can_upload(client).await?);
    assert!(limiter.can_download(client).await?);
    assert_eq!(limiter.usage(client).await?, QuotaUsage::default());
    Ok(())
}

async fn test_checks_do_not_mutate(limiter: &dyn RateLimiter) -> Result<(), RateLimitError> {
    let client = "198.51.100.2";
    for _ in 0..10 {
        limiter.can_upload(client).await?;
        limiter.can_download(client).await?;
    }
    assert_eq!(limiter.usage(client).await?, QuotaUsage::default());
    Ok(())
}

async fn test_upload_quota_exhausts(limiter: &dyn RateLimiter) -> Result<(), RateLimitError> {
    let client = "198.51.100.3";
    exhaust(limiter, Direction::Upload, client).await?;
    assert!(
        !limiter.can_upload(client).await?,
        "upload past the daily maximum should be refused"
    );
    assert_eq!(
        limiter.count(Direction::Upload, client).await?,
        limiter.limits().uploads
    );
    Ok(())
}

async fn test_directions_are_independent(limiter: &dyn RateLimiter) -> Result<(), RateLimitError> {
    let client = "198.51.100.4";
    exhaust(limiter, Direction::Download, client).await?;
    assert!(!limiter.can_download(client).await?);
    assert!(
        limiter.can_upload(client).await?,
        "download counter must not affect uploads"
    );
    limiter.record_upload(client).await?;
    assert_eq!(
        limiter.usage(client).await?,
        QuotaUsage {
            uploads: 1,
            downloads: limiter.limits().downloads,
        }
    );
    Ok(())
}

async fn test_clients_are_independent(limiter: &dyn RateLimiter) -> Result<(), RateLimitError> {
    let a = "198.51.100.5";
    let b = "198.51.100.6";
    exhaust(limiter, Direction::Upload, a).await?;
    assert!(!limiter.can_upload(a).await?);
    assert!(
        limiter.can_upload(b).await?,
        "another client in the same window should be allowed"
    );
    assert_eq!(limiter.count(Direction::Upload, b).await?, 0);
    Ok(())
}

async fn test_day_rollover(
    limiter: &dyn RateLimiter,
    clock: &ManualClock,
) -> Result<(), RateLimitError> {
    let client = "198.51.100.7";
    exhaust(limiter, Direction::Upload, client).await?;
    assert!(!limiter.can_upload(client).await?);

    clock.advance(TimeDelta::days(1));
    assert!(
        limiter.can_upload(client).await?,
        "a new UTC day should start a fresh counter"
    );
    assert_eq!(limiter.count(Direction::Upload, client).await?, 0);

    limiter.record_upload(client).await?;
    assert_eq!(limiter.count(Direction::Upload, client).await?, 1);
    Ok(())
}

async fn test_reset_clears_everything(limiter: &dyn RateLimiter) -> Result<(), RateLimitError> {
    let client = "198.51.100.8";
    exhaust(limiter, Direction::Upload, client).await?;
    limiter.record_download(client).await?;
    assert!(!limiter.can_upload(client).await?);

    limiter.reset().await?;
    assert!(limiter.can_upload(client).await?);
    assert_eq!(limiter.usage(client).await?, QuotaUsage::default());
    assert_eq!(limiter.usage("198.51.100.3").await?, QuotaUsage::default());
    Ok(())
}
