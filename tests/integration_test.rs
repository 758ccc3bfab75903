//! Integration tests for bizmigrate.
//!
//! The Postgres tests require environment variables to be set:
//! - `BIZMIGRATE_DB_HOST`: Source database host
//! - `BIZMIGRATE_DB_NAME`: Source database name
//! - `BIZMIGRATE_DB_USER`: Source database user
//! - `BIZMIGRATE_DB_PASSWORD`: Source database password
//! - `BIZMIGRATE_TABLE`: Table to scan (defaults to `businesses`)
//!
//! Run with: `cargo test --test integration_test -- --ignored`
//!
//! The NDJSON tests run against temporary files and need no setup.

#![allow(clippy::pedantic)]

use std::env;
use std::io::Write;

use bizmigrate::config::{GeocodeOptions, MigrationOptions, NdjsonConfig};
use bizmigrate::sources::ndjson::NdjsonSource;
use bizmigrate::{Pipeline, RecordSource, RunState};
use tempfile::TempDir;

/// Helper to check if database tests are enabled
fn db_enabled() -> bool {
    env::var("BIZMIGRATE_DB_HOST").is_ok() && env::var("BIZMIGRATE_DB_PASSWORD").is_ok()
}

#[cfg(feature = "postgres")]
fn db_source_config() -> Option<bizmigrate::config::PostgresSourceConfig> {
    use bizmigrate::config::{DbConfig, PostgresSourceConfig};

    Some(PostgresSourceConfig {
        connection: DbConfig {
            host: env::var("BIZMIGRATE_DB_HOST").ok()?,
            port: env::var("BIZMIGRATE_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: env::var("BIZMIGRATE_DB_NAME").ok()?,
            user: env::var("BIZMIGRATE_DB_USER").ok()?,
            password: env::var("BIZMIGRATE_DB_PASSWORD").ok()?,
            pool_size: 2,
            timeout_secs: 10,
        },
        table: env::var("BIZMIGRATE_TABLE").unwrap_or_else(|_| "businesses".to_string()),
        city: env::var("BIZMIGRATE_CITY").ok(),
    })
}

#[cfg(feature = "postgres")]
#[tokio::test]
#[ignore] // Run with --ignored flag when env vars are set
async fn test_postgres_connection_and_count() {
    use bizmigrate::sources::postgres::PostgresSource;

    if !db_enabled() {
        eprintln!("Skipping: BIZMIGRATE_DB_HOST and BIZMIGRATE_DB_PASSWORD not set");
        return;
    }

    let config = db_source_config().unwrap();
    let mut source = PostgresSource::new(config);

    source.connect().await.expect("Failed to connect");
    let count = source.count().await.expect("Failed to count");

    println!("✅ Connected to source database!");
    println!("   Rows matching filter: {:?}", count);

    assert!(count.is_some(), "Postgres sources always report a count");

    source.close().await.expect("Failed to close");
}

#[cfg(feature = "postgres")]
#[tokio::test]
#[ignore]
async fn test_postgres_keyset_scan() {
    use bizmigrate::sources::postgres::PostgresSource;

    if !db_enabled() {
        return;
    }

    let config = db_source_config().unwrap();
    let mut source = PostgresSource::new(config);
    source.connect().await.unwrap();

    let first = source
        .fetch_batch(None, 10)
        .await
        .expect("Failed to fetch batch");

    println!("✅ Fetched {} rows", first.records.len());

    if let Some(record) = first.records.first() {
        println!("   First id: {:?}", record.id);
        assert!(record.id.is_some(), "Scanned rows must carry an id");
    }

    // The second page must start strictly after the first
    if first.has_more {
        let second = source
            .fetch_batch(first.next_cursor.clone(), 10)
            .await
            .unwrap();
        let last_of_first = first.records.last().and_then(|r| r.id.clone()).unwrap();
        for record in &second.records {
            assert!(record.id.clone().unwrap() > last_of_first);
        }
    }

    source.close().await.unwrap();
}

fn write_ndjson(dir: &TempDir, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.path().join("export.ndjson");
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path
}

#[tokio::test]
async fn test_ndjson_dry_run_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write_ndjson(
        &dir,
        &[
            r#"{"_id": "gs_001", "verlagsdaten": {"kontaktinformationen": {"personListe": [{"name": "Bäckerei Schmidt"}], "adresse": {"strasse": "Hauptstraße", "hausnummer": "12", "postleitzahl": "10115", "ortsname": "Berlin"}}, "branchenIdListe": [30, 7]}}"#,
            r#"{"_id": "gs_002", "verlagsdaten": {"kontaktinformationen": {"adresse": {"ortsname": "Berlin"}}}}"#,
            "not json at all",
            r#"{"_id": "gs_003"}"#,
        ],
    );

    let source = NdjsonSource::new(NdjsonConfig {
        path,
        geocoding: GeocodeOptions {
            enabled: false,
            ..Default::default()
        },
    });

    let options = MigrationOptions {
        batch_size: 2,
        dry_run: true,
        ..Default::default()
    };

    let mut pipeline = Pipeline::new(Box::new(source), None, None, options);
    let stats = pipeline.run().await.unwrap();

    assert_eq!(pipeline.state(), RunState::Completed);
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.migrated, 3);
    assert_eq!(stats.skipped_errors, 1);
    assert_eq!(stats.skipped_lines, vec![3]);
}

#[tokio::test]
async fn test_ndjson_dry_run_leaves_no_checkpoint() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = (0..10)
        .map(|i| format!(r#"{{"_id": "gs_{i:03}", "verlagsdaten": {{}}}}"#))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let path = write_ndjson(&dir, &refs);
    let checkpoint_path = dir.path().join("run.checkpoint");

    let make_source = |path: std::path::PathBuf| {
        NdjsonSource::new(NdjsonConfig {
            path,
            geocoding: GeocodeOptions {
                enabled: false,
                ..Default::default()
            },
        })
    };

    // Dry runs commit nothing, so they record no positions
    let options = MigrationOptions {
        batch_size: 4,
        dry_run: true,
        checkpoint_path: Some(checkpoint_path.clone()),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(Box::new(make_source(path.clone())), None, None, options);
    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.processed, 10);
    assert!(!checkpoint_path.exists());

    // Resuming against a missing checkpoint starts from the beginning
    let options = MigrationOptions {
        batch_size: 4,
        dry_run: true,
        resume: true,
        checkpoint_path: Some(checkpoint_path),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(Box::new(make_source(path)), None, None, options);
    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.processed, 10);
}
