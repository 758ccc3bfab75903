//! Configuration types for bizmigrate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main migration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source configuration.
    pub source: SourceConfig,
    /// Target store configuration.
    pub target: TargetConfig,
    /// Run options.
    #[serde(default)]
    pub options: MigrationOptions,
}

/// Source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// `PostgreSQL` source store.
    #[serde(rename = "postgres")]
    Postgres(PostgresSourceConfig),
    /// Newline-delimited JSON ingestion file.
    #[serde(rename = "ndjson")]
    Ndjson(NdjsonConfig),
}

/// Connection parameters for a `PostgreSQL` store.
///
/// Secrets live here, injected from the config file or environment, never
/// embedded in source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Host name.
    pub host: String,
    /// Port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name.
    pub database: String,
    /// User name.
    pub user: String,
    /// Password.
    #[serde(default)]
    pub password: String,
    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Connect timeout in seconds.
    #[serde(default = "default_db_timeout")]
    pub timeout_secs: u64,
}

impl DbConfig {
    /// Timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `PostgreSQL` source store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresSourceConfig {
    /// Connection parameters.
    pub connection: DbConfig,
    /// Table holding the business records.
    #[serde(default = "default_table")]
    pub table: String,
    /// Optional equality filter on `city` (partial migrations).
    pub city: Option<String>,
}

/// NDJSON ingestion file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdjsonConfig {
    /// Path to the NDJSON file (one JSON object per line).
    pub path: PathBuf,
    /// Geocoding enrichment options.
    #[serde(default)]
    pub geocoding: GeocodeOptions,
}

/// Geocoding enrichment options (ingestion only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeOptions {
    /// Whether to geocode records without coordinates.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Provider endpoint (Nominatim-compatible search API).
    #[serde(default = "default_geocode_endpoint")]
    pub endpoint: String,
    /// User-Agent header, required by Nominatim's usage policy.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-lookup timeout in seconds.
    #[serde(default = "default_geocode_timeout")]
    pub timeout_secs: u64,
    /// Minimum interval between provider calls, in milliseconds.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_geocode_endpoint(),
            user_agent: default_user_agent(),
            timeout_secs: default_geocode_timeout(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

/// Target store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Connection parameters.
    pub connection: DbConfig,
    /// Table to insert into.
    #[serde(default = "default_table")]
    pub table: String,
}

/// Run options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Batch size for scanning and inserting.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Cap on the number of records to process (trial runs).
    pub limit: Option<u64>,
    /// Dry run mode (scan and transform, don't write).
    #[serde(default)]
    pub dry_run: bool,
    /// Resume from the last committed cursor in the checkpoint file.
    #[serde(default)]
    pub resume: bool,
    /// Checkpoint file path.
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            limit: None,
            dry_run: false,
            resume: false,
            checkpoint_path: None,
        }
    }
}

fn default_port() -> u16 {
    5432
}

fn default_pool_size() -> u32 {
    5
}

fn default_db_timeout() -> u64 {
    30
}

fn default_table() -> String {
    "businesses".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_geocode_endpoint() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    "bizmigrate".to_string()
}

fn default_geocode_timeout() -> u64 {
    10
}

fn default_min_interval_ms() -> u64 {
    1000
}

impl MigrationConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.options.batch_size == 0 {
            return Err(crate::error::Error::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.target.table.is_empty() {
            return Err(crate::error::Error::Config(
                "target table name cannot be empty".to_string(),
            ));
        }
        validate_db(&self.target.connection, "target")?;
        match &self.source {
            SourceConfig::Postgres(cfg) => {
                if cfg.table.is_empty() {
                    return Err(crate::error::Error::Config(
                        "source table name cannot be empty".to_string(),
                    ));
                }
                validate_db(&cfg.connection, "source")?;
            }
            SourceConfig::Ndjson(cfg) => {
                if cfg.path.as_os_str().is_empty() {
                    return Err(crate::error::Error::Config(
                        "ndjson path cannot be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn validate_db(db: &DbConfig, which: &str) -> crate::error::Result<()> {
    if db.host.is_empty() || db.database.is_empty() || db.user.is_empty() {
        return Err(crate::error::Error::Config(format!(
            "{which} connection requires host, database and user"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> DbConfig {
        DbConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "business_db".to_string(),
            user: "postgres".to_string(),
            password: "secret".to_string(),
            pool_size: 5,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_options_defaults() {
        let options = MigrationOptions::default();
        assert_eq!(options.batch_size, 1000);
        assert!(!options.dry_run);
        assert!(!options.resume);
        assert_eq!(options.limit, None);
    }

    #[test]
    fn test_geocode_defaults() {
        let geo = GeocodeOptions::default();
        assert!(geo.enabled);
        assert_eq!(geo.timeout_secs, 10);
        assert_eq!(geo.min_interval_ms, 1000);
    }

    #[test]
    fn test_config_yaml_parse() {
        let yaml = r#"
source:
  type: postgres
  connection:
    host: localhost
    database: business_db
    user: postgres
    password: secret
  city: Berlin
target:
  connection:
    host: db.example.supabase.co
    port: 6543
    database: postgres
    user: postgres.project
    password: secret
options:
  batch_size: 5000
  resume: true
"#;
        let config: MigrationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.options.batch_size, 5000);
        assert!(config.options.resume);
        assert_eq!(config.target.table, "businesses");
        match config.source {
            SourceConfig::Postgres(cfg) => {
                assert_eq!(cfg.city.as_deref(), Some("Berlin"));
                assert_eq!(cfg.connection.pool_size, 5);
            }
            SourceConfig::Ndjson(_) => panic!("expected postgres source"),
        }
    }

    #[test]
    fn test_ndjson_yaml_parse() {
        let yaml = r#"
source:
  type: ndjson
  path: ./data/businesses.ndjson
  geocoding:
    enabled: false
target:
  connection:
    host: localhost
    database: postgres
    user: postgres
"#;
        let config: MigrationConfig = serde_yaml::from_str(yaml).unwrap();
        match config.source {
            SourceConfig::Ndjson(cfg) => {
                assert!(!cfg.geocoding.enabled);
                assert_eq!(cfg.geocoding.min_interval_ms, 1000);
            }
            SourceConfig::Postgres(_) => panic!("expected ndjson source"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = MigrationConfig {
            source: SourceConfig::Postgres(PostgresSourceConfig {
                connection: db(),
                table: "businesses".to_string(),
                city: None,
            }),
            target: TargetConfig {
                connection: db(),
                table: "businesses".to_string(),
            },
            options: MigrationOptions {
                batch_size: 0,
                ..Default::default()
            },
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_incomplete_connection() {
        let mut bad = db();
        bad.user = String::new();
        let config = MigrationConfig {
            source: SourceConfig::Ndjson(NdjsonConfig {
                path: "data.ndjson".into(),
                geocoding: GeocodeOptions::default(),
            }),
            target: TargetConfig {
                connection: bad,
                table: "businesses".to_string(),
            },
            options: MigrationOptions::default(),
        };
        assert!(config.validate().is_err());
    }
}
