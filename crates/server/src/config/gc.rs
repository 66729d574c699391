use std::time::Duration;

use chrono::TimeDelta;
use relay_gc::{GcConfig, Schedule};
use serde::Deserialize;

use crate::error::ServerError;

/// Garbage collector configuration.
#[derive(Debug, Deserialize)]
pub struct GcServerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Cron expression in UTC. Ignored when `interval_seconds` is set.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Fixed delay between sweeps, as an alternative to `schedule`.
    pub interval_seconds: Option<u64>,
    /// Inactivity threshold, e.g. `"14d"` or `"12h"`.
    #[serde(default = "default_inactive_after")]
    pub inactive_after: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for GcServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            schedule: default_schedule(),
            interval_seconds: None,
            inactive_after: default_inactive_after(),
            page_size: default_page_size(),
        }
    }
}

impl GcServerConfig {
    /// Build the collector settings.
    pub fn to_gc_config(&self) -> Result<GcConfig, ServerError> {
        let schedule = match self.interval_seconds {
            Some(secs) => Schedule::Interval(Duration::from_secs(secs)),
            None => Schedule::cron(&self.schedule)
                .map_err(|e| ServerError::Config(format!("[gc] schedule: {e}")))?,
        };
        Ok(GcConfig {
            inactive_after: parse_duration(&self.inactive_after)?,
            page_size: self.page_size,
            schedule,
        })
    }
}

fn default_enabled() -> bool {
    true
}

fn default_schedule() -> String {
    "0 1 * * *".to_owned()
}

fn default_inactive_after() -> String {
    "14d".to_owned()
}

fn default_page_size() -> usize {
    25
}

/// Parse `<n>s`, `<n>m`, `<n>h`, `<n>d` or `<n>w`.
pub fn parse_duration(value: &str) -> Result<TimeDelta, ServerError> {
    let invalid = || {
        ServerError::Config(format!(
            "invalid duration '{value}' (expected <n>s, <n>m, <n>h, <n>d or <n>w)"
        ))
    };

    let value = value.trim();
    let unit = value.chars().last().ok_or_else(invalid)?;
    let amount: i64 = value[..value.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount < 0 {
        return Err(invalid());
    }

    let delta = match unit {
        's' => TimeDelta::try_seconds(amount),
        'm' => TimeDelta::try_minutes(amount),
        'h' => TimeDelta::try_hours(amount),
        'd' => TimeDelta::try_days(amount),
        'w' => TimeDelta::try_weeks(amount),
        _ => None,
    };
    delta.ok_or_else(invalid)
}
