//! Business record migration CLI.
//!
//! CLI tool for moving business directory records into a PostGIS-backed
//! businesses table. Pedantic lints relaxed for CLI ergonomics.

#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use bizmigrate::{MigrationConfig, Pipeline, SourceConfig};

#[derive(Parser)]
#[command(name = "bizmigrate")]
#[command(version)]
#[command(about = "Migrate business records between databases and exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dry run mode (don't write to target)
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Batch size override
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop after this many records (trial runs)
    #[arg(long)]
    limit: Option<u64>,

    /// Resume from the checkpoint recorded by a previous run
    #[arg(long)]
    resume: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migration from config file
    Run {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Show row count and size figures for the target
    Stats {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Generate example configuration
    Init {
        /// Source type (postgres, ndjson)
        #[arg(short, long)]
        source: String,

        /// Output file path
        #[arg(short, long, default_value = "migration.yaml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let overrides = Overrides {
        dry_run: cli.dry_run,
        batch_size: cli.batch_size,
        limit: cli.limit,
        resume: cli.resume,
    };

    match cli.command {
        Some(Commands::Run { config }) => {
            run_migration(&config, &overrides).await?;
        }
        Some(Commands::Validate { config }) => {
            validate_config(&config)?;
        }
        Some(Commands::Stats { config }) => {
            show_stats(&config).await?;
        }
        Some(Commands::Init { source, output }) => {
            generate_config(&source, &output)?;
        }
        None => {
            // Default: run migration if config provided
            if let Some(config) = cli.config {
                run_migration(&config, &overrides).await?;
            } else {
                eprintln!("Usage: bizmigrate --config <FILE> or bizmigrate <COMMAND>");
                eprintln!("Try 'bizmigrate --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

struct Overrides {
    dry_run: bool,
    batch_size: Option<usize>,
    limit: Option<u64>,
    resume: bool,
}

async fn run_migration(config_path: &PathBuf, overrides: &Overrides) -> anyhow::Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let mut config = MigrationConfig::from_file(config_path)?;

    if overrides.dry_run {
        config.options.dry_run = true;
    }
    if let Some(bs) = overrides.batch_size {
        config.options.batch_size = bs;
    }
    if let Some(limit) = overrides.limit {
        config.options.limit = Some(limit);
    }
    if overrides.resume {
        config.options.resume = true;
    }

    config.validate()?;

    info!("Starting migration...");

    let mut pipeline = Pipeline::from_config(config)?;
    let stats = pipeline.run().await?;

    println!("\n✅ Migration Complete!");
    println!("   Processed:  {}", stats.processed);
    println!("   Migrated:   {}", stats.migrated);
    println!("   Duplicates: {}", stats.skipped_duplicates);
    println!("   Errors:     {}", stats.skipped_errors);
    println!("   Duration:   {:.2}s", stats.duration_secs);
    println!("   Throughput: {:.0} records/sec", stats.throughput());

    if !stats.skipped_lines.is_empty() {
        println!("   Unreadable input lines: {:?}", stats.skipped_lines);
    }

    Ok(())
}

fn validate_config(config_path: &PathBuf) -> anyhow::Result<()> {
    info!("Validating configuration from {:?}", config_path);

    let config = MigrationConfig::from_file(config_path)?;
    config.validate()?;

    let source = match &config.source {
        SourceConfig::Postgres(cfg) => format!("postgres ({})", cfg.table),
        SourceConfig::Ndjson(cfg) => format!("ndjson ({})", cfg.path.display()),
    };

    println!("✅ Configuration is valid!");
    println!("   Source:     {}", source);
    println!("   Target:     {}", config.target.table);
    println!("   Batch size: {}", config.options.batch_size);

    Ok(())
}

#[cfg(feature = "postgres")]
async fn show_stats(config_path: &PathBuf) -> anyhow::Result<()> {
    use bizmigrate::target::postgres::PostgresTarget;
    use bizmigrate::TargetStore;

    info!("Loading configuration from {:?}", config_path);

    let config = MigrationConfig::from_file(config_path)?;
    let mut target = PostgresTarget::new(config.target.clone());
    target.connect().await?;
    let report = target.report().await?;
    target.close().await?;

    println!("\n📊 Target: {}", config.target.table);
    println!("   Rows:          {}", report.row_count);
    println!("   Database size: {}", report.database_size);
    println!("   Table size:    {}", report.table_size);

    Ok(())
}

#[cfg(not(feature = "postgres"))]
async fn show_stats(_config_path: &PathBuf) -> anyhow::Result<()> {
    anyhow::bail!("the stats command requires the 'postgres' feature")
}

fn generate_config(source: &str, output: &PathBuf) -> anyhow::Result<()> {
    let template = match source.to_lowercase().as_str() {
        "postgres" => POSTGRES_TEMPLATE,
        "ndjson" => NDJSON_TEMPLATE,
        _ => {
            error!("Unknown source type: {}", source);
            eprintln!("Supported sources: postgres, ndjson");
            std::process::exit(1);
        }
    };

    std::fs::write(output, template)?;
    println!("✅ Generated configuration: {:?}", output);
    println!("   Edit the file and run: bizmigrate run --config {:?}", output);

    Ok(())
}

const POSTGRES_TEMPLATE: &str = r#"# bizmigrate configuration - Postgres source
source:
  type: postgres
  connection:
    host: localhost
    port: 5432
    database: businesses
    user: postgres
    password: ${SOURCE_DB_PASSWORD}
  table: businesses
  # city: Berlin  # Optional equality filter

target:
  connection:
    host: db.your-project.supabase.co
    port: 5432
    database: postgres
    user: postgres
    password: ${TARGET_DB_PASSWORD}
  table: businesses

options:
  batch_size: 1000
  dry_run: false
  # limit: 100
  # checkpoint_path: ./migration.checkpoint
"#;

const NDJSON_TEMPLATE: &str = r#"# bizmigrate configuration - NDJSON export source
source:
  type: ndjson
  path: ./data.ndjson
  geocoding:
    enabled: true
    endpoint: https://nominatim.openstreetmap.org
    user_agent: bizmigrate
    timeout_secs: 10
    min_interval_ms: 1000

target:
  connection:
    host: localhost
    port: 5432
    database: businesses
    user: postgres
    password: ${TARGET_DB_PASSWORD}
  table: businesses

options:
  batch_size: 100
  dry_run: false
  # checkpoint_path: ./ingest.checkpoint
"#;
