//! NDJSON ingestion source (one JSON object per line).
//!
//! Lines that fail to parse are skipped and reported by their 1-based line
//! number; a record without its identifier is left to the transformer,
//! which rejects it per record.

use std::fs::File;
use std::io::{BufRead, BufReader};

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::config::NdjsonConfig;
use crate::error::{Error, Result};
use crate::sources::{Cursor, RawRecord, RecordBatch, RecordSource};

/// NDJSON file source.
pub struct NdjsonSource {
    config: NdjsonConfig,
    reader: Option<BufReader<File>>,
    /// Number of input lines consumed so far.
    line_no: u64,
}

impl NdjsonSource {
    /// Creates a new NDJSON source.
    #[must_use]
    pub fn new(config: NdjsonConfig) -> Self {
        Self {
            config,
            reader: None,
            line_no: 0,
        }
    }

    /// Reads the next line, `None` at end of file.
    fn next_line(&mut self) -> Result<Option<String>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| Error::SourceConnection("NDJSON source not connected".to_string()))?;
        let mut buf = String::new();
        let read = reader
            .read_line(&mut buf)
            .map_err(|e| Error::Extraction(format!("Read failed at line {}: {e}", self.line_no + 1)))?;
        if read == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(buf))
    }

    /// Skips forward to a resume offset. Only forward movement is
    /// supported; the file is read strictly sequentially.
    fn skip_to(&mut self, offset: u64) -> Result<()> {
        while self.line_no < offset {
            if self.next_line()?.is_none() {
                break;
            }
        }
        Ok(())
    }
}

/// Maps one parsed NDJSON object to a raw record.
///
/// The wire format nests everything under `verlagsdaten`: contact and
/// address data under `kontaktinformationen`, category ids under
/// `branchenIdListe`. Optional fields stay optional; only the identifier
/// is required downstream.
pub fn raw_record_from_value(value: &Value, line: u64) -> RawRecord {
    let kontakt = value
        .pointer("/verlagsdaten/kontaktinformationen")
        .unwrap_or(&Value::Null);
    let adresse = kontakt.get("adresse").unwrap_or(&Value::Null);

    RawRecord {
        id: json_string(value.get("_id")),
        name: kontakt
            .pointer("/personListe/0/name")
            .and_then(Value::as_str)
            .map(str::to_string),
        street: json_string(adresse.get("strasse")),
        house_number: json_string(adresse.get("hausnummer")),
        postal_code: json_string(adresse.get("postleitzahl")),
        city: json_string(adresse.get("ortsname")),
        district: json_string(adresse.get("kgs")),
        category_ids: value
            .pointer("/verlagsdaten/branchenIdListe")
            .and_then(Value::as_array)
            .cloned(),
        phone: json_string(kontakt.get("telefon")),
        email: json_string(kontakt.get("email")),
        website: json_string(kontakt.get("website")),
        line: Some(line),
        ..RawRecord::default()
    }
}

/// Reads a scalar as a string, accepting both JSON strings and numbers.
fn json_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl RecordSource for NdjsonSource {
    fn source_type(&self) -> &'static str {
        "ndjson"
    }

    async fn connect(&mut self) -> Result<()> {
        let file = File::open(&self.config.path).map_err(|e| {
            Error::SourceConnection(format!(
                "Failed to open NDJSON file '{}': {e}",
                self.config.path.display()
            ))
        })?;
        self.reader = Some(BufReader::new(file));
        self.line_no = 0;
        Ok(())
    }

    async fn count(&self) -> Result<Option<u64>> {
        // Counting would require a full pass over the file.
        Ok(None)
    }

    async fn fetch_batch(
        &mut self,
        cursor: Option<Cursor>,
        batch_size: usize,
    ) -> Result<RecordBatch> {
        match cursor {
            Some(Cursor::Offset { offset }) => self.skip_to(offset)?,
            Some(Cursor::AfterId { .. }) => {
                return Err(Error::Extraction(
                    "NDJSON source paginates by line offset, not by id".to_string(),
                ));
            }
            None => {}
        }

        let mut batch = RecordBatch::default();
        while batch.records.len() < batch_size {
            let Some(line) = self.next_line()? else {
                break;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => {
                    batch.records.push(raw_record_from_value(&value, self.line_no));
                }
                Err(e) => {
                    warn!("Skipping malformed JSON on line {}: {}", self.line_no, e);
                    batch.skipped_lines.push(self.line_no);
                }
            }
        }

        batch.has_more = batch.records.len() == batch_size;
        batch.next_cursor = Some(Cursor::Offset { offset: self.line_no });
        Ok(batch)
    }

    async fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "ndjson_tests.rs"]
mod tests;
