use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::GcError;

/// When sweeps run.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// A fixed delay between the end of one sweep and the start of the next.
    Interval(Duration),
    /// A cron expression evaluated in UTC.
    Cron(croner::Cron),
}

impl Schedule {
    /// Parse a cron expression (5 or 6 fields).
    pub fn cron(expr: &str) -> Result<Self, GcError> {
        croner::Cron::new(expr)
            .parse()
            .map(Self::Cron)
            .map_err(|e| GcError::Schedule(format!("{expr}: {e}")))
    }

    /// How long to wait from `now` until the next sweep.
    ///
    /// Returns `None` if a cron expression has no future occurrence.
    pub fn delay_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Interval(every) => Some(*every),
            Self::Cron(cron) => {
                let next = cron.find_next_occurrence(&now, false).ok()?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

/// Garbage collector settings.
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Records untouched for at least this long are evicted (default: 14 days).
    pub inactive_after: TimeDelta,
    /// Records fetched and deleted per page (default: 25).
    pub page_size: usize,
    /// Sweep schedule (default: daily).
    pub schedule: Schedule,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            inactive_after: TimeDelta::days(14),
            page_size: 25,
            schedule: Schedule::Interval(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn interval_delay_is_constant() {
        let schedule = Schedule::Interval(Duration::from_secs(90));
        assert_eq!(schedule.delay_after(Utc::now()), Some(Duration::from_secs(90)));
    }

    #[test]
    fn daily_cron_waits_until_one_am() {
        let schedule = Schedule::cron("0 1 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2030, 3, 10, 0, 30, 0).unwrap();
        assert_eq!(
            schedule.delay_after(now),
            Some(Duration::from_secs(30 * 60))
        );

        let after = Utc.with_ymd_and_hms(2030, 3, 10, 1, 0, 0).unwrap();
        assert_eq!(
            schedule.delay_after(after),
            Some(Duration::from_secs(24 * 60 * 60)),
            "an occurrence exactly at now is skipped"
        );
    }

    #[test]
    fn invalid_cron_is_rejected() {
        assert!(matches!(
            Schedule::cron("every day at one"),
            Err(GcError::Schedule(_))
        ));
    }

    #[test]
    fn defaults() {
        let config = GcConfig::default();
        assert_eq!(config.inactive_after, TimeDelta::days(14));
        assert_eq!(config.page_size, 25);
    }
}
