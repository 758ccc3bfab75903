//! Record sources: ordered, paginated scans over business data.

pub mod ndjson;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A raw business row as produced by a source, before transformation.
///
/// Every field is optional here; the transformer decides what is required
/// and reports precisely which field is missing.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// External identifier. Required; its absence is a per-record failure.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Street name (ingestion records carry street and house number apart).
    pub street: Option<String>,
    /// House number.
    pub house_number: Option<String>,
    /// Pre-joined street address (store rows carry the joined form).
    pub street_address: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// District or municipality key.
    pub district: Option<String>,
    /// Category identifiers as already-serialized JSON text (store rows).
    pub categories: Option<String>,
    /// Category identifiers as parsed values (ingestion records).
    pub category_ids: Option<Vec<serde_json::Value>>,
    /// Phone number.
    pub phone: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Website URL.
    pub website: Option<String>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Geometry as WKT text, as read from the source store.
    pub geometry_wkt: Option<String>,
    /// Active flag.
    pub is_active: Option<bool>,
    /// Opaque embedding vector text.
    pub embedding: Option<String>,
    /// Opaque opening-hours structure.
    pub opening_hours: Option<serde_json::Value>,
    /// 1-based input line number, when the record came from a file.
    pub line: Option<u64>,
}

/// Position of a scan within its source, carried across batches and runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cursor {
    /// Keyset position: scan resumes strictly after this id.
    AfterId {
        /// Last id of the previous committed batch.
        id: String,
    },
    /// Line/row offset position (file sources).
    Offset {
        /// Number of input lines already consumed.
        offset: u64,
    },
}

/// A batch of raw records plus pagination info.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    /// Records in this batch.
    pub records: Vec<RawRecord>,
    /// Cursor to pass to the next `fetch_batch` call.
    pub next_cursor: Option<Cursor>,
    /// Whether the source may hold further batches.
    pub has_more: bool,
    /// 1-based line numbers dropped while filling this batch
    /// (unparseable input lines).
    pub skipped_lines: Vec<u64>,
}

/// Trait for record sources.
///
/// Implementations produce batches ordered ascending by id (or input order
/// for file sources), each of at most `batch_size` records. A scan
/// terminates once a fetch returns fewer records than requested. Fetching
/// is read-only; a failure while fetching a page is fatal for the run.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Source type name, for logging.
    fn source_type(&self) -> &'static str;

    /// Opens the source and validates its configuration.
    async fn connect(&mut self) -> Result<()>;

    /// Total number of matching records, when cheaply known.
    /// Informational only; does not gate correctness.
    async fn count(&self) -> Result<Option<u64>>;

    /// Fetches the next batch after `cursor` (from the start when `None`).
    async fn fetch_batch(&mut self, cursor: Option<Cursor>, batch_size: usize)
        -> Result<RecordBatch>;

    /// Closes the source and releases resources.
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_serde_round_trip() {
        let keyset = Cursor::AfterId { id: "biz_42".to_string() };
        let json = serde_json::to_string(&keyset).unwrap();
        assert_eq!(serde_json::from_str::<Cursor>(&json).unwrap(), keyset);

        let offset = Cursor::Offset { offset: 5000 };
        let json = serde_json::to_string(&offset).unwrap();
        assert_eq!(serde_json::from_str::<Cursor>(&json).unwrap(), offset);
    }

    #[test]
    fn test_cursor_tagged_representation() {
        let json = serde_json::to_value(Cursor::AfterId { id: "a".to_string() }).unwrap();
        assert_eq!(json["type"], "after_id");
        assert_eq!(json["id"], "a");
    }
}
