//! Error types for bizmigrate.

use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a migration or ingestion run.
///
/// Variants split along the propagation policy: connection and page-fetch
/// errors terminate the run, everything else is absorbed into skip counters
/// by the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not open or query the source store.
    #[error("Source connection error: {0}")]
    SourceConnection(String),

    /// Could not open or query the target store.
    #[error("Target connection error: {0}")]
    TargetConnection(String),

    /// Failed to fetch a page of rows mid-scan. Fatal for the run.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A single record lacks a required field. Per-record, not per-run.
    #[error("Record is missing required field '{field}'{}", .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    MissingField {
        /// Name of the missing field.
        field: String,
        /// 1-based input line number, when the record came from a file.
        line: Option<u64>,
    },

    /// Malformed geometry text or out-of-range coordinates.
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Failed to apply a batch to the target. Scoped to the batch.
    #[error("Loading error: {0}")]
    Loading(String),

    /// Failed to read or write the resume checkpoint.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error from the geocoding provider.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database driver error.
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse error.
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Convenience constructor for a missing required field.
    pub fn missing_field(field: impl Into<String>, line: Option<u64>) -> Self {
        Self::MissingField {
            field: field.into(),
            line,
        }
    }

    /// Whether this error must terminate the run.
    ///
    /// Per-record and per-batch failures are absorbed by the pipeline into
    /// skip counters; only connection-level and page-fetch failures abort.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::SourceConnection(_)
                | Self::TargetConnection(_)
                | Self::Extraction(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message_with_line() {
        let err = Error::missing_field("_id", Some(4));
        assert_eq!(err.to_string(), "Record is missing required field '_id' (line 4)");
    }

    #[test]
    fn test_missing_field_message_without_line() {
        let err = Error::missing_field("name", None);
        assert_eq!(err.to_string(), "Record is missing required field 'name'");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::SourceConnection("refused".into()).is_fatal());
        assert!(Error::Extraction("page 3 failed".into()).is_fatal());
        assert!(!Error::missing_field("_id", None).is_fatal());
        assert!(!Error::Loading("constraint".into()).is_fatal());
    }
}
