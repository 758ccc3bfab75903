//! The migrated/ingested business entity and its geometry encoding.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Spatial reference identifier used for all geometry values (WGS84).
pub const SRID: u32 = 4326;

/// A business record as written to the target store.
///
/// `geometry` is never carried as an independent field: it is always derived
/// from the coordinate pair via [`BusinessRecord::geometry_wkt`], so a WKT
/// value inconsistent with `latitude`/`longitude` cannot be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    /// Stable external identifier, unique in the target.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Street plus house number, when known.
    pub street_address: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// District or municipality key.
    pub district: Option<String>,
    /// Category identifiers as JSON array text, `None` when empty.
    pub categories: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Website URL.
    pub website: Option<String>,
    /// Latitude in degrees; present iff `longitude` is present.
    pub latitude: Option<f64>,
    /// Longitude in degrees; present iff `latitude` is present.
    pub longitude: Option<f64>,
    /// Active flag; defaults to true on ingestion.
    pub is_active: bool,
    /// Opaque embedding vector text, passed through unmodified.
    pub embedding: Option<String>,
    /// Opaque opening-hours structure, passed through unmodified.
    pub opening_hours: Option<serde_json::Value>,
}

impl BusinessRecord {
    /// WKT point derived from the coordinate pair, `None` when either
    /// coordinate is absent.
    #[must_use]
    pub fn geometry_wkt(&self) -> Option<String> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some(encode_point(lon, lat)),
            _ => None,
        }
    }

    /// Sets both coordinates at once, preserving the both-or-neither
    /// invariant.
    pub fn set_coordinates(&mut self, coords: Option<(f64, f64)>) {
        match coords {
            Some((lat, lon)) => {
                self.latitude = Some(lat);
                self.longitude = Some(lon);
            }
            None => {
                self.latitude = None;
                self.longitude = None;
            }
        }
    }
}

/// Encodes a coordinate pair as WKT `POINT(lon lat)`.
///
/// The default float formatting is shortest-round-trip, so decoding the
/// result yields the original pair exactly.
#[must_use]
pub fn encode_point(lon: f64, lat: f64) -> String {
    format!("POINT({lon} {lat})")
}

/// Decodes a WKT `POINT(lon lat)` into `(lon, lat)`.
///
/// # Errors
///
/// Returns [`Error::Geometry`] when the text is not a point or the
/// coordinates are outside valid longitude/latitude ranges.
pub fn decode_point(wkt: &str) -> Result<(f64, f64)> {
    let trimmed = wkt.trim();
    let inner = trimmed
        .strip_prefix("POINT")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| Error::Geometry(format!("Not a WKT point: '{wkt}'")))?;

    let mut parts = inner.split_whitespace();
    let lon: f64 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::Geometry(format!("Invalid longitude in '{wkt}'")))?;
    let lat: f64 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::Geometry(format!("Invalid latitude in '{wkt}'")))?;
    if parts.next().is_some() {
        return Err(Error::Geometry(format!("Trailing coordinates in '{wkt}'")));
    }

    validate_coordinates(lon, lat)?;
    Ok((lon, lat))
}

/// Checks that a coordinate pair lies within valid WGS84 ranges.
pub fn validate_coordinates(lon: f64, lat: f64) -> Result<()> {
    if !(-180.0..=180.0).contains(&lon) {
        return Err(Error::Geometry(format!("Longitude {lon} out of range")));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::Geometry(format!("Latitude {lat} out of range")));
    }
    Ok(())
}
