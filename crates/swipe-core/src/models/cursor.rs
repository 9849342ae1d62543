//! Replication cursor

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Timestamp half of the sentinel cursor used when nothing has been replicated.
pub const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Key half of the sentinel cursor used when nothing has been replicated.
pub const EPOCH_KEY: &str = "0";

/// Position of the last replicated record: `(ModificationTimestamp, ListingKey)`.
///
/// Ordering is timestamp first, then key. Timestamps that parse as RFC 3339
/// are compared as instants so that mixed fractional precision
/// (`...:00Z` vs `...:00.5Z`) still orders correctly; anything else falls back
/// to plain string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub timestamp: String,
    pub key: String,
}

impl Cursor {
    pub fn new(timestamp: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            key: key.into(),
        }
    }

    /// The sentinel cursor that precedes every real record.
    pub fn epoch() -> Self {
        Self::new(EPOCH_TIMESTAMP, EPOCH_KEY)
    }

    pub fn is_epoch(&self) -> bool {
        self.timestamp == EPOCH_TIMESTAMP && self.key == EPOCH_KEY
    }

    /// Whether a record at `(timestamp, key)` lies strictly after this cursor.
    pub fn precedes(&self, timestamp: &str, key: &str) -> bool {
        match compare_timestamps(timestamp, &self.timestamp) {
            Ordering::Greater => true,
            Ordering::Equal => key > self.key.as_str(),
            Ordering::Less => false,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::epoch()
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_timestamps(&self.timestamp, &other.timestamp).then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.timestamp, self.key)
    }
}

fn compare_timestamps(left: &str, right: &str) -> Ordering {
    match (parse_timestamp(left), parse_timestamp(right)) {
        (Some(l), Some(r)) => l.cmp(&r).then_with(|| left.cmp(right)),
        _ => left.cmp(right),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}
