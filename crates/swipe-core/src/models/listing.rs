//! Listing models: the raw feed shape and the locally persisted shape

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::Cursor;

/// A listing as returned by the upstream `Property` resource.
///
/// Only the fields replication needs are modelled; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpstreamRecord {
    pub listing_key: String,
    pub modification_timestamp: String,
    #[serde(default)]
    pub unparsed_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state_or_province: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub list_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub bedrooms_total: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub bathrooms_total_integer: Option<i64>,
    #[serde(default)]
    pub contract_status: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub property_sub_type: Option<String>,
}

impl UpstreamRecord {
    /// Minimal record, mostly useful for fixtures.
    pub fn new(
        listing_key: impl Into<String>,
        modification_timestamp: impl Into<String>,
        list_price: f64,
    ) -> Self {
        Self {
            listing_key: listing_key.into(),
            modification_timestamp: modification_timestamp.into(),
            unparsed_address: None,
            city: None,
            state_or_province: None,
            postal_code: None,
            list_price: Some(list_price),
            bedrooms_total: None,
            bathrooms_total_integer: None,
            contract_status: Some("Available".to_string()),
            property_type: None,
            property_sub_type: None,
        }
    }

    /// Cursor position of this record.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(&self.modification_timestamp, &self.listing_key)
    }
}

/// One row of a feed page, in the order upstream returned it.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEntry {
    Listing(UpstreamRecord),
    /// A row that could not be read as a listing.
    Malformed(MalformedRow),
}

/// What could be salvaged from a row that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    pub listing_key: Option<String>,
    pub modification_timestamp: Option<String>,
    pub reason: String,
}

impl MalformedRow {
    /// Position of the row, when both cursor fields were readable.
    pub fn cursor(&self) -> Option<Cursor> {
        match (&self.modification_timestamp, &self.listing_key) {
            (Some(timestamp), Some(key)) => Some(Cursor::new(timestamp, key)),
            _ => None,
        }
    }
}

impl PageEntry {
    /// Read one element of a page's `value` array.
    pub fn from_value(value: Value) -> Self {
        let listing_key = text_field(&value, "ListingKey");
        let modification_timestamp = text_field(&value, "ModificationTimestamp");

        match serde_json::from_value::<UpstreamRecord>(value) {
            Ok(record) => Self::Listing(record),
            Err(error) => Self::Malformed(MalformedRow {
                listing_key,
                modification_timestamp,
                reason: error.to_string(),
            }),
        }
    }

    pub fn cursor(&self) -> Option<Cursor> {
        match self {
            Self::Listing(record) => Some(record.cursor()),
            Self::Malformed(row) => row.cursor(),
        }
    }

    pub fn listing_key(&self) -> Option<&str> {
        match self {
            Self::Listing(record) => Some(&record.listing_key),
            Self::Malformed(row) => row.listing_key.as_deref(),
        }
    }
}

impl From<UpstreamRecord> for PageEntry {
    fn from(record: UpstreamRecord) -> Self {
        Self::Listing(record)
    }
}

fn text_field(value: &Value, name: &str) -> Option<String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// A listing row in the local store, keyed by the upstream `ListingKey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub id: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub price: f64,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub property_type: PropertyCategory,
    pub last_timestamp: String,
    pub last_key: String,
    pub is_active: bool,
}

impl LocalRecord {
    pub fn cursor(&self) -> Cursor {
        Cursor::new(&self.last_timestamp, &self.last_key)
    }
}

/// Normalized property categories exposed to the swipe feed.
///
/// The set is closed: consumers filter on these exact labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyCategory {
    Detached,
    Townhouse,
    #[serde(rename = "Multi-Family")]
    MultiFamily,
    Condo,
    #[serde(rename = "Specialty Residential")]
    SpecialtyResidential,
    #[serde(rename = "Rural Residential")]
    RuralResidential,
    Other,
}

impl PropertyCategory {
    pub const ALL: [Self; 7] = [
        Self::Detached,
        Self::Townhouse,
        Self::MultiFamily,
        Self::Condo,
        Self::SpecialtyResidential,
        Self::RuralResidential,
        Self::Other,
    ];

    /// Map a raw upstream subtype/type string onto a category.
    ///
    /// Input is trimmed; anything outside the table is `Other`.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "Single Family Residence" | "Detached" | "Residential" | "Residential Detached" => {
                Self::Detached
            }
            "Townhouse" | "Att/Row/Townhouse" => Self::Townhouse,
            "Duplex" | "Triplex" | "Quadruplex" | "Multi Family" => Self::MultiFamily,
            "Condominium" | "Condo Apt" | "Co-Ownership" | "Own Your Own"
            | "Stock Cooperative" | "Apartment" => Self::Condo,
            "Cabin" | "Ranch" => Self::SpecialtyResidential,
            "Farm" | "Agriculture" => Self::RuralResidential,
            _ => Self::Other,
        }
    }

    /// Parse a stored label back into a category.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == label)
            .unwrap_or(Self::Other)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detached => "Detached",
            Self::Townhouse => "Townhouse",
            Self::MultiFamily => "Multi-Family",
            Self::Condo => "Condo",
            Self::SpecialtyResidential => "Specialty Residential",
            Self::RuralResidential => "Rural Residential",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// The feed is loose about numeric types: prices occasionally arrive as strings
// and integer counts as floats.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_f64(deserializer)?;
    Ok(value
        .filter(|number| number.is_finite() && number.fract() == 0.0)
        .map(|number| number as i64))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn upstream_record_parses_feed_payload() {
        let payload = r#"{
            "ListingKey": "W9012345",
            "ModificationTimestamp": "2024-05-02T14:03:11.417Z",
            "UnparsedAddress": "12 Maple Ave, Toronto",
            "City": "Toronto",
            "StateOrProvince": "ON",
            "ListPrice": 899000,
            "BedroomsTotal": 3,
            "BathroomsTotalInteger": 2.0,
            "ContractStatus": "Available",
            "PropertyType": "Residential Freehold",
            "PropertySubType": "Detached",
            "PublicRemarks": "ignored"
        }"#;

        let record: UpstreamRecord = serde_json::from_str(payload).unwrap();
        assert_eq!(record.listing_key, "W9012345");
        assert_eq!(record.list_price, Some(899_000.0));
        assert_eq!(record.bathrooms_total_integer, Some(2));
        assert_eq!(record.postal_code, None);
        assert_eq!(
            record.cursor(),
            Cursor::new("2024-05-02T14:03:11.417Z", "W9012345")
        );
    }

    #[test]
    fn upstream_record_accepts_string_price_and_null_counts() {
        let payload = r#"{
            "ListingKey": "C1",
            "ModificationTimestamp": "2024-05-02T00:00:00Z",
            "ListPrice": " 450000 ",
            "BedroomsTotal": null
        }"#;

        let record: UpstreamRecord = serde_json::from_str(payload).unwrap();
        assert_eq!(record.list_price, Some(450_000.0));
        assert_eq!(record.bedrooms_total, None);
    }

    #[test]
    fn badly_typed_row_keeps_its_position() {
        let entry = PageEntry::from_value(serde_json::json!({
            "ListingKey": "A2",
            "ModificationTimestamp": "2024-05-02T00:00:00Z",
            "City": 5
        }));

        let PageEntry::Malformed(row) = &entry else {
            panic!("expected a malformed row, got {entry:?}");
        };
        assert!(row.reason.contains("invalid type"), "{}", row.reason);
        assert_eq!(entry.listing_key(), Some("A2"));
        assert_eq!(entry.cursor(), Some(Cursor::new("2024-05-02T00:00:00Z", "A2")));
    }

    #[test]
    fn row_without_timestamp_has_no_position() {
        let entry = PageEntry::from_value(serde_json::json!({
            "ListingKey": "A3",
            "ModificationTimestamp": null
        }));

        assert!(matches!(entry, PageEntry::Malformed(_)));
        assert_eq!(entry.listing_key(), Some("A3"));
        assert_eq!(entry.cursor(), None);
    }

    #[test]
    fn well_formed_row_is_a_listing() {
        let entry = PageEntry::from_value(serde_json::json!({
            "ListingKey": "A1",
            "ModificationTimestamp": "2024-05-02T00:00:00Z",
            "ListPrice": 450000
        }));

        let PageEntry::Listing(record) = entry else {
            panic!("expected a listing, got {entry:?}");
        };
        assert_eq!(record.listing_key, "A1");
        assert_eq!(record.list_price, Some(450_000.0));
    }

    #[test]
    fn category_labels_round_trip() {
        for category in PropertyCategory::ALL {
            assert_eq!(PropertyCategory::from_label(category.as_str()), category);
        }
        assert_eq!(
            PropertyCategory::from_label("Bungalow"),
            PropertyCategory::Other
        );
    }

    #[test]
    fn category_serializes_with_display_labels() {
        let json = serde_json::to_string(&PropertyCategory::MultiFamily).unwrap();
        assert_eq!(json, "\"Multi-Family\"");
    }
}
