//! Mapping from upstream feed records to local listing rows

use crate::models::{LocalRecord, PropertyCategory, UpstreamRecord};
use crate::util::normalize_text_option;

/// Why a record was dropped instead of persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    MissingPrice,
    InvalidPrice,
}

/// Normalize the property category from the subtype, falling back to the type.
///
/// A present-but-blank subtype does not fall through to the type.
pub fn normalize_property_type(
    sub_type: Option<&str>,
    property_type: Option<&str>,
) -> PropertyCategory {
    PropertyCategory::from_raw(sub_type.or(property_type).unwrap_or(""))
}

/// Accept only finite, strictly positive prices.
pub fn validate_price(price: f64) -> Option<f64> {
    (price.is_finite() && price > 0.0).then_some(price)
}

/// Convert a raw record into its local shape, or explain why it is discarded.
pub fn try_transform(raw: &UpstreamRecord) -> Result<LocalRecord, DiscardReason> {
    let price = raw.list_price.ok_or(DiscardReason::MissingPrice)?;
    let price = validate_price(price).ok_or(DiscardReason::InvalidPrice)?;

    Ok(LocalRecord {
        id: raw.listing_key.clone(),
        address: normalize_text_option(raw.unparsed_address.clone()),
        city: normalize_text_option(raw.city.clone()),
        province: normalize_text_option(raw.state_or_province.clone()),
        postal_code: normalize_text_option(raw.postal_code.clone()),
        price,
        bedrooms: raw.bedrooms_total,
        bathrooms: raw.bathrooms_total_integer,
        property_type: normalize_property_type(
            raw.property_sub_type.as_deref(),
            raw.property_type.as_deref(),
        ),
        last_timestamp: raw.modification_timestamp.clone(),
        last_key: raw.listing_key.clone(),
        is_active: true,
    })
}

/// Convert a raw record, logging and returning `None` when it is discarded.
pub fn transform(raw: &UpstreamRecord) -> Option<LocalRecord> {
    match try_transform(raw) {
        Ok(record) => Some(record),
        Err(reason) => {
            tracing::warn!(
                listing_key = %raw.listing_key,
                price = ?raw.list_price,
                ?reason,
                "Skipping listing with invalid price"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(price: f64) -> UpstreamRecord {
        UpstreamRecord::new("N100", "2024-06-01T00:00:00Z", price)
    }

    #[test]
    fn normalizes_known_and_unknown_types() {
        assert_eq!(
            normalize_property_type(Some("Condo Apt"), None),
            PropertyCategory::Condo
        );
        assert_eq!(normalize_property_type(Some(""), None), PropertyCategory::Other);
        assert_eq!(normalize_property_type(None, None), PropertyCategory::Other);
        assert_eq!(
            normalize_property_type(Some("Unknown Thing"), None),
            PropertyCategory::Other
        );
        assert_eq!(
            normalize_property_type(Some("  Att/Row/Townhouse "), None),
            PropertyCategory::Townhouse
        );
    }

    #[test]
    fn subtype_wins_over_type() {
        assert_eq!(
            normalize_property_type(Some("Farm"), Some("Condo Apt")),
            PropertyCategory::RuralResidential
        );
        assert_eq!(
            normalize_property_type(None, Some("Quadruplex")),
            PropertyCategory::MultiFamily
        );
        assert_eq!(
            normalize_property_type(Some(""), Some("Detached")),
            PropertyCategory::Other
        );
    }

    #[test]
    fn mapping_table_is_complete() {
        let cases = [
            ("Single Family Residence", PropertyCategory::Detached),
            ("Detached", PropertyCategory::Detached),
            ("Residential", PropertyCategory::Detached),
            ("Residential Detached", PropertyCategory::Detached),
            ("Townhouse", PropertyCategory::Townhouse),
            ("Duplex", PropertyCategory::MultiFamily),
            ("Triplex", PropertyCategory::MultiFamily),
            ("Multi Family", PropertyCategory::MultiFamily),
            ("Condominium", PropertyCategory::Condo),
            ("Co-Ownership", PropertyCategory::Condo),
            ("Own Your Own", PropertyCategory::Condo),
            ("Stock Cooperative", PropertyCategory::Condo),
            ("Apartment", PropertyCategory::Condo),
            ("Cabin", PropertyCategory::SpecialtyResidential),
            ("Ranch", PropertyCategory::SpecialtyResidential),
            ("Agriculture", PropertyCategory::RuralResidential),
        ];
        for (raw, expected) in cases {
            assert_eq!(PropertyCategory::from_raw(raw), expected, "{raw}");
        }
    }

    #[test]
    fn price_validation_rejects_non_positive_and_non_finite() {
        assert_eq!(validate_price(0.0), None);
        assert_eq!(validate_price(-100.0), None);
        assert_eq!(validate_price(f64::NAN), None);
        assert_eq!(validate_price(f64::INFINITY), None);
        assert_eq!(validate_price(450_000.0), Some(450_000.0));
    }

    #[test]
    fn transform_discards_invalid_price() {
        assert!(transform(&raw(0.0)).is_none());
        assert_eq!(try_transform(&raw(-1.0)), Err(DiscardReason::InvalidPrice));

        let mut missing = raw(1.0);
        missing.list_price = None;
        assert_eq!(try_transform(&missing), Err(DiscardReason::MissingPrice));
    }

    #[test]
    fn transform_maps_fields_and_marks_active() {
        let mut source = raw(725_000.0);
        source.unparsed_address = Some(" 55 King St W ".to_string());
        source.city = Some(String::new());
        source.bedrooms_total = Some(2);
        source.property_sub_type = Some("Condo Apt".to_string());

        let record = transform(&source).unwrap();
        assert_eq!(record.id, "N100");
        assert_eq!(record.address.as_deref(), Some("55 King St W"));
        assert_eq!(record.city, None);
        assert_eq!(record.bedrooms, Some(2));
        assert_eq!(record.property_type, PropertyCategory::Condo);
        assert_eq!(record.last_timestamp, "2024-06-01T00:00:00Z");
        assert_eq!(record.last_key, "N100");
        assert!(record.is_active);
    }
}
