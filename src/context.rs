//! Block context passed to every state transition.

use chrono::{DateTime, Utc};

/// Height and time of the block being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub height: u64,
    pub time: DateTime<Utc>,
}

impl BlockContext {
    pub fn new(height: u64, time: DateTime<Utc>) -> Self {
        Self { height, time }
    }

    /// Block at `height` with a unix-seconds timestamp. Out-of-range times fall back to the epoch.
    pub fn at_unix(height: u64, secs: i64) -> Self {
        Self {
            height,
            time: DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default(),
        }
    }
}
