//! Listing media model

use serde::{Deserialize, Serialize};

/// One photo attached to an upstream listing.
///
/// `order` is optional because the feed does not always populate it; items
/// without an order share a single dedup slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub order: Option<i64>,
    pub url: String,
}

impl MediaItem {
    pub fn new(order: i64, url: impl Into<String>) -> Self {
        Self {
            order: Some(order),
            url: url.into(),
        }
    }
}
