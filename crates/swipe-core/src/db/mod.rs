//! Storage layer for replicated listings

mod connection;
mod schema;
mod store;

pub use connection::Database;
pub use store::{CursorStore, LibSqlListingStore, ListingCounts, ListingStore};
