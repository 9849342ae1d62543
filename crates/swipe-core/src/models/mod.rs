//! Data models for Swipe replication

mod cursor;
mod listing;
mod media;

pub use cursor::{Cursor, EPOCH_KEY, EPOCH_TIMESTAMP};
pub use listing::{LocalRecord, MalformedRow, PageEntry, PropertyCategory, UpstreamRecord};
pub use media::MediaItem;
