//! Upstream listings feed.
//!
//! [`ListingFeed`] is the seam the replication driver and the reconciliation
//! sweeper depend on; [`ODataFeedClient`] implements it over HTTP.

mod client;
pub mod query;

use std::collections::HashSet;
use std::future::Future;

use thiserror::Error;

pub use client::ODataFeedClient;
pub use query::{ListingFilter, RESIDENTIAL_SUBTYPES};

use crate::models::{Cursor, MediaItem, PageEntry};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid feed configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Feed HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed with HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("Invalid feed payload: {0}")]
    InvalidPayload(String),
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Operations the pipeline needs from the upstream provider.
pub trait ListingFeed: Send + Sync {
    /// Number of records strictly after `cursor`.
    fn count_pending(&self, cursor: &Cursor) -> impl Future<Output = FeedResult<u64>> + Send;

    /// Up to `page_size` rows strictly after `cursor`, ordered by
    /// `(ModificationTimestamp, ListingKey)`.
    ///
    /// Rows that do not parse come back as [`PageEntry::Malformed`] in their
    /// original position; only a payload that is not a page at all fails.
    fn fetch_page(
        &self,
        cursor: &Cursor,
        page_size: usize,
    ) -> impl Future<Output = FeedResult<Vec<PageEntry>>> + Send;

    /// All media for one listing, ordered by `Order`.
    fn fetch_media(
        &self,
        listing_key: &str,
    ) -> impl Future<Output = FeedResult<Vec<MediaItem>>> + Send;

    /// One page of active listing keys, ignoring the cursor.
    fn fetch_active_key_page(
        &self,
        skip: usize,
        top: usize,
    ) -> impl Future<Output = FeedResult<Vec<String>>> + Send;

    /// Every active listing key upstream.
    ///
    /// Pages until a short or empty page comes back.
    fn fetch_all_active_keys(
        &self,
        batch_size: usize,
    ) -> impl Future<Output = FeedResult<HashSet<String>>> + Send {
        async move {
            let batch_size = batch_size.max(1);
            let mut keys = HashSet::new();
            let mut skip = 0;

            loop {
                let page = self.fetch_active_key_page(skip, batch_size).await?;
                let returned = page.len();
                keys.extend(page);
                tracing::debug!(skip, returned, total = keys.len(), "Fetched active key page");

                if returned == 0 || returned < batch_size {
                    break;
                }
                skip += returned;
            }

            Ok(keys)
        }
    }
}
