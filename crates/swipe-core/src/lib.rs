//! swipe-core - Core library for Swipe
//!
//! This crate contains the listing models, the upstream feed client, the
//! libSQL storage sink, and the incremental replication pipeline shared by the
//! trigger API and the operator CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod media;
pub mod models;
pub mod sync;
pub mod transform;
pub mod util;

pub use error::{Error, Result};
pub use models::{
    Cursor, LocalRecord, MalformedRow, MediaItem, PageEntry, PropertyCategory, UpstreamRecord,
};
