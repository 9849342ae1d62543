//! Incremental replication and reconciliation
//!
//! [`Replicator`] pages through the feed from the stored cursor and persists
//! each listing; [`Sweeper`] retires listings that vanished upstream.

mod gate;
mod replicator;
mod sweeper;

#[cfg(test)]
mod testing;

pub use crate::config::CursorPolicy;
pub use gate::{Admission, AdmissionGate};
pub use replicator::{ReplicationReport, Replicator};
pub use sweeper::{missing_ids, SweepReport, Sweeper};

use crate::db::CursorStore;
use crate::models::Cursor;

/// Load the stored cursor, falling back to the epoch on any failure.
pub async fn read_cursor<S: CursorStore>(store: &S) -> Cursor {
    match store.load_cursor().await {
        Ok(Some(cursor)) => cursor,
        Ok(None) => Cursor::epoch(),
        Err(error) => {
            tracing::warn!(error = %error, "Failed to read replication cursor, starting from epoch");
            Cursor::epoch()
        }
    }
}

/// Milliseconds since `started`, saturating.
fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
