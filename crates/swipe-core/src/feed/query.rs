//! OData query construction for the listings feed.
//!
//! Predicate text must match what the provider expects byte for byte; only the
//! final URL is percent-encoded.

use crate::models::Cursor;

/// Property subtypes/types replicated into the swipe feed.
pub const RESIDENTIAL_SUBTYPES: [&str; 16] = [
    "Residential",
    "Residential Detached",
    "Single Family Residence",
    "Detached",
    "Townhouse",
    "Att/Row/Townhouse",
    "Duplex",
    "Triplex",
    "Quadruplex",
    "Multi Family",
    "Condominium",
    "Condo Apt",
    "Co-Ownership",
    "Own Your Own",
    "Stock Cooperative",
    "Apartment",
];

const INCREMENTAL_ORDER_BY: &str = "ModificationTimestamp,ListingKey";
const KEY_ORDER_BY: &str = "ListingKey";

/// Base predicate selecting available listings in scope for replication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFilter {
    predicate: String,
}

impl ListingFilter {
    /// Available listings whose subtype or type is in [`RESIDENTIAL_SUBTYPES`].
    pub fn residential() -> Self {
        Self::for_subtypes(&RESIDENTIAL_SUBTYPES)
    }

    pub fn for_subtypes(subtypes: &[&str]) -> Self {
        let clauses = subtypes
            .iter()
            .map(|value| {
                let escaped = escape_literal(value);
                format!("(PropertySubType eq '{escaped}' or PropertyType eq '{escaped}')")
            })
            .collect::<Vec<_>>()
            .join(" or ");
        Self {
            predicate: format!("ContractStatus eq 'Available' and ({clauses})"),
        }
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Predicate restricted to records strictly after `cursor`.
    pub fn after(&self, cursor: &Cursor) -> String {
        let timestamp = &cursor.timestamp;
        let key = escape_literal(&cursor.key);
        format!(
            "{} and (ModificationTimestamp gt {timestamp} or (ModificationTimestamp eq {timestamp} and ListingKey gt '{key}'))",
            self.predicate
        )
    }
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self::residential()
    }
}

/// `Property` query for the next page after `cursor`.
pub fn page_url(base_url: &str, filter: &ListingFilter, cursor: &Cursor, top: usize) -> String {
    format!(
        "{base_url}/Property?$filter={}&$orderby={INCREMENTAL_ORDER_BY}&$top={top}",
        urlencoding::encode(&filter.after(cursor))
    )
}

/// `Property` count-only query for records after `cursor`.
pub fn count_url(base_url: &str, filter: &ListingFilter, cursor: &Cursor) -> String {
    format!(
        "{base_url}/Property?$filter={}&$orderby={INCREMENTAL_ORDER_BY}&$top=0&$count=true",
        urlencoding::encode(&filter.after(cursor))
    )
}

/// `Property` full-scan query used by reconciliation (no cursor).
pub fn key_page_url(base_url: &str, filter: &ListingFilter, skip: usize, top: usize) -> String {
    format!(
        "{base_url}/Property?$filter={}&$orderby={KEY_ORDER_BY}&$top={top}&$skip={skip}",
        urlencoding::encode(filter.predicate())
    )
}

/// `Media` query for one listing.
pub fn media_url(
    base_url: &str,
    listing_key: &str,
    size_description: Option<&str>,
    limit: u32,
) -> String {
    format!(
        "{base_url}/Media?$filter={}&$orderby=Order&$top={limit}",
        urlencoding::encode(&media_predicate(listing_key, size_description))
    )
}

pub fn media_predicate(listing_key: &str, size_description: Option<&str>) -> String {
    let mut predicate = format!("ResourceRecordKey eq '{}'", escape_literal(listing_key));
    if let Some(size) = size_description {
        predicate.push_str(&format!(
            " and ImageSizeDescription eq '{}'",
            escape_literal(size)
        ));
    }
    predicate
}

/// Escape an OData string literal body.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
