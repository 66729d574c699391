use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RateLimitError;

/// Which daily counter an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    /// Stable lowercase name, used in backend keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "uploads",
            Self::Download => "downloads",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-client daily maximums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLimits {
    pub uploads: u64,
    pub downloads: u64,
}

impl DailyLimits {
    pub fn new(uploads: u64, downloads: u64) -> Self {
        Self { uploads, downloads }
    }

    /// The maximum for one direction.
    pub fn max(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Upload => self.uploads,
            Direction::Download => self.downloads,
        }
    }
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self {
            uploads: 5,
            downloads: 25,
        }
    }
}

/// A client's counters for the current day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub uploads: u64,
    pub downloads: u64,
}

impl QuotaUsage {
    pub fn get(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Upload => self.uploads,
            Direction::Download => self.downloads,
        }
    }

    /// Increment one counter and return its new value.
    pub fn bump(&mut self, direction: Direction) -> u64 {
        let slot = match direction {
            Direction::Upload => &mut self.uploads,
            Direction::Download => &mut self.downloads,
        };
        *slot = slot.saturating_add(1);
        *slot
    }
}

/// Daily quota enforcement keyed by client address and UTC day.
///
/// Backends implement [`count`](Self::count) and [`record`](Self::record);
/// the upload/download operations are provided on top of them. Checks never
/// mutate state, and a check followed by a record is not atomic: concurrent
/// requests from one client may overshoot the limit by the number of
/// requests in flight.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Current day's counter for `client` in `direction`.
    async fn count(&self, direction: Direction, client: &str) -> Result<u64, RateLimitError>;

    /// Atomically increment the current day's counter. Each call counts once.
    async fn record(&self, direction: Direction, client: &str) -> Result<(), RateLimitError>;

    /// The configured daily maximums.
    fn limits(&self) -> DailyLimits;

    /// Clear every counter for every client and day.
    async fn reset(&self) -> Result<(), RateLimitError>;

    /// Whether the backend is reachable. Never fails.
    async fn is_live(&self) -> bool;

    /// `true` iff the counter is strictly below the daily maximum.
    async fn allows(&self, direction: Direction, client: &str) -> Result<bool, RateLimitError> {
        let used = self.count(direction, client).await?;
        Ok(used < self.limits().max(direction))
    }

    async fn can_upload(&self, client: &str) -> Result<bool, RateLimitError> {
        self.allows(Direction::Upload, client).await
    }

    async fn record_upload(&self, client: &str) -> Result<(), RateLimitError> {
        self.record(Direction::Upload, client).await
    }

    async fn can_download(&self, client: &str) -> Result<bool, RateLimitError> {
        self.allows(Direction::Download, client).await
    }

    async fn record_download(&self, client: &str) -> Result<(), RateLimitError> {
        self.record(Direction::Download, client).await
    }

    /// Both of today's counters for `client`.
    async fn usage(&self, client: &str) -> Result<QuotaUsage, RateLimitError> {
        Ok(QuotaUsage {
            uploads: self.count(Direction::Upload, client).await?,
            downloads: self.count(Direction::Download, client).await?,
        })
    }
}
