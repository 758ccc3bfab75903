//! Raw row to [`BusinessRecord`] transformation.

use crate::error::{Error, Result};
use crate::record::{decode_point, validate_coordinates, BusinessRecord};
use crate::sources::RawRecord;

/// Pure transformer from raw source rows to target entities.
///
/// Performs no IO. Total over valid shapes; a record lacking its identifier
/// fails with [`Error::MissingField`], which is a per-record failure.
#[derive(Debug, Clone, Default)]
pub struct Transformer;

impl Transformer {
    /// Creates a new transformer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Transforms one raw record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] when the record has no id and
    /// [`Error::Geometry`] when its coordinates or geometry text are
    /// malformed.
    pub fn transform(&self, raw: RawRecord) -> Result<BusinessRecord> {
        let id = normalize(raw.id).ok_or_else(|| Error::missing_field("id", raw.line))?;

        // Ingestion records without a usable name keep the original
        // importer's placeholder.
        let name = normalize(raw.name).unwrap_or_else(|| format!("Business_{id}"));

        let street_address = normalize(raw.street_address)
            .or_else(|| join_street_address(raw.street.as_deref(), raw.house_number.as_deref()));

        let categories = match normalize(raw.categories) {
            Some(text) => Some(text),
            None => serialize_categories(raw.category_ids.as_deref())?,
        };

        let (latitude, longitude) =
            reconcile_coordinates(raw.latitude, raw.longitude, raw.geometry_wkt.as_deref())?;

        Ok(BusinessRecord {
            id,
            name,
            street_address,
            postal_code: normalize(raw.postal_code),
            city: normalize(raw.city),
            district: normalize(raw.district),
            categories,
            phone: normalize(raw.phone),
            email: normalize(raw.email),
            website: normalize(raw.website),
            latitude,
            longitude,
            is_active: raw.is_active.unwrap_or(true),
            embedding: raw.embedding,
            opening_hours: raw.opening_hours,
        })
    }
}

/// Trims a string field, mapping empty values to `None`.
fn normalize(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Joins street and house number when at least one is present.
fn join_street_address(street: Option<&str>, house_number: Option<&str>) -> Option<String> {
    let street = street.unwrap_or("").trim();
    let house_number = house_number.unwrap_or("").trim();
    if street.is_empty() && house_number.is_empty() {
        return None;
    }
    Some(format!("{street} {house_number}").trim().to_string())
}

/// Serializes category identifiers as JSON array text, preserving their
/// source order. Empty or absent lists serialize to `None`.
fn serialize_categories(ids: Option<&[serde_json::Value]>) -> Result<Option<String>> {
    match ids {
        Some(ids) if !ids.is_empty() => Ok(Some(serde_json::to_string(ids)?)),
        _ => Ok(None),
    }
}

/// Resolves the coordinate pair from explicit values or source geometry.
///
/// The explicit pair wins; a half pair counts as absent so the derived
/// geometry can never disagree with the stored coordinates. Store rows that
/// only carry WKT get their pair decoded from it.
fn reconcile_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
    geometry_wkt: Option<&str>,
) -> Result<(Option<f64>, Option<f64>)> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => {
            validate_coordinates(lon, lat)?;
            Ok((Some(lat), Some(lon)))
        }
        _ => match geometry_wkt {
            Some(wkt) => {
                let (lon, lat) = decode_point(wkt)?;
                Ok((Some(lat), Some(lon)))
            }
            None => Ok((None, None)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str) -> RawRecord {
        RawRecord {
            id: Some(id.to_string()),
            name: Some("Musterfirma".to_string()),
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_missing_id_is_per_record_error() {
        let mut record = raw("x");
        record.id = None;
        record.line = Some(7);

        let err = Transformer::new().transform(record).unwrap_err();
        match err {
            Error::MissingField { field, line } => {
                assert_eq!(field, "id");
                assert_eq!(line, Some(7));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_id_counts_as_missing() {
        let mut record = raw("x");
        record.id = Some("   ".to_string());
        assert!(Transformer::new().transform(record).is_err());
    }

    #[test]
    fn test_name_placeholder_when_absent() {
        let mut record = raw("biz_9");
        record.name = None;
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.name, "Business_biz_9");
    }

    #[test]
    fn test_street_address_join() {
        let cases = [
            (Some("Hauptstraße"), Some("12a"), Some("Hauptstraße 12a")),
            (Some("Hauptstraße"), None, Some("Hauptstraße")),
            (None, Some("12"), Some("12")),
            (None, None, None),
            (Some("  "), Some(""), None),
        ];
        for (street, number, expected) in cases {
            assert_eq!(
                join_street_address(street, number),
                expected.map(String::from),
                "join({street:?}, {number:?})"
            );
        }
    }

    #[test]
    fn test_pre_joined_address_wins() {
        let mut record = raw("b");
        record.street_address = Some("Alte Gasse 3".to_string());
        record.street = Some("ignored".to_string());
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.street_address.as_deref(), Some("Alte Gasse 3"));
    }

    #[test]
    fn test_categories_preserve_order() {
        let mut record = raw("b");
        record.category_ids = Some(vec![
            serde_json::json!(30),
            serde_json::json!(7),
            serde_json::json!(152),
        ]);
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.categories.as_deref(), Some("[30,7,152]"));
    }

    #[test]
    fn test_empty_categories_stay_absent() {
        let mut record = raw("b");
        record.category_ids = Some(vec![]);
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.categories, None);
    }

    #[test]
    fn test_categories_text_passthrough() {
        let mut record = raw("b");
        record.categories = Some("[1, 2, 3]".to_string());
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.categories.as_deref(), Some("[1, 2, 3]"));
    }

    #[test]
    fn test_coordinates_decoded_from_wkt() {
        let mut record = raw("b");
        record.geometry_wkt = Some("POINT(13.405 52.52)".to_string());
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.longitude, Some(13.405));
        assert_eq!(out.latitude, Some(52.52));
        assert_eq!(out.geometry_wkt().as_deref(), Some("POINT(13.405 52.52)"));
    }

    #[test]
    fn test_explicit_pair_wins_over_wkt() {
        let mut record = raw("b");
        record.latitude = Some(48.137);
        record.longitude = Some(11.576);
        record.geometry_wkt = Some("POINT(0 0)".to_string());
        let out = Transformer::new().transform(record).unwrap();
        // Geometry is always derived from the pair, never forwarded
        assert_eq!(out.geometry_wkt().as_deref(), Some("POINT(11.576 48.137)"));
    }

    #[test]
    fn test_half_pair_counts_as_absent() {
        let mut record = raw("b");
        record.latitude = Some(48.137);
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.latitude, None);
        assert_eq!(out.longitude, None);
        assert_eq!(out.geometry_wkt(), None);
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let mut record = raw("b");
        record.latitude = Some(95.0);
        record.longitude = Some(13.4);
        assert!(Transformer::new().transform(record).is_err());
    }

    #[test]
    fn test_opaque_fields_pass_through() {
        let mut record = raw("b");
        record.embedding = Some("[0.1,0.2,0.3]".to_string());
        record.opening_hours = Some(serde_json::json!({"mon": "9-18"}));
        record.is_active = Some(false);
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.embedding.as_deref(), Some("[0.1,0.2,0.3]"));
        assert_eq!(out.opening_hours, Some(serde_json::json!({"mon": "9-18"})));
        assert!(!out.is_active);
    }

    #[test]
    fn test_empty_strings_become_null() {
        let mut record = raw("b");
        record.postal_code = Some(String::new());
        record.city = Some("  ".to_string());
        record.phone = Some("030 1234".to_string());
        let out = Transformer::new().transform(record).unwrap();
        assert_eq!(out.postal_code, None);
        assert_eq!(out.city, None);
        assert_eq!(out.phone.as_deref(), Some("030 1234"));
    }
}
