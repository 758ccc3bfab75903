// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # `bizmigrate`
//!
//! `bizmigrate` is a CLI tool and library for moving business directory
//! records into a `PostGIS`-backed businesses table, either from another
//! Postgres database or from newline-delimited JSON exports.
//!
//! ## Supported Sources
//!
//! | Source | Status | Notes |
//! |--------|--------|-------|
//! | Postgres | ✅ | Keyset-paginated scan, requires `postgres` feature |
//! | NDJSON | ✅ | Publisher export files, with optional geocoding |
//!
//! Writes use batch transactions with `ON CONFLICT (id) DO NOTHING`, so a
//! run can be repeated or resumed without creating duplicates.
//!
//! ## Quick Start
//!
//! ```bash
//! # Migrate between databases
//! bizmigrate run --config migration.yaml
//!
//! # Dry run (preview only)
//! bizmigrate run --config migration.yaml --dry-run
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   type: postgres
//!   connection:
//!     host: localhost
//!     database: businesses
//!     user: postgres
//!     password: secret
//!   table: businesses
//!   city: Berlin
//!
//! target:
//!   connection:
//!     host: db.example.supabase.co
//!     database: postgres
//!     user: postgres
//!     password: secret
//!   table: businesses
//!
//! options:
//!   batch_size: 1000
//! ```

#![warn(missing_docs)]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod geocode;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod sources;
pub mod target;
pub mod transform;

pub use config::{MigrationConfig, MigrationOptions, SourceConfig, TargetConfig};
pub use error::{Error, Result};
pub use geocode::{GeocodeCache, GeocodeEnricher};
pub use pipeline::{Pipeline, RunState};
pub use progress::{MigrationStats, ProgressTracker};
pub use record::BusinessRecord;
pub use sources::{Cursor, RawRecord, RecordBatch, RecordSource};
pub use target::{BatchResult, TargetStore};
pub use transform::Transformer;
