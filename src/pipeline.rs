//! Migration pipeline orchestration.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::checkpoint;
use crate::config::{MigrationConfig, MigrationOptions, SourceConfig};
use crate::error::{Error, Result};
use crate::geocode::GeocodeEnricher;
use crate::progress::{MigrationStats, ProgressTracker};
use crate::record::BusinessRecord;
use crate::sources::ndjson::NdjsonSource;
use crate::sources::{Cursor, RawRecord, RecordBatch, RecordSource};
use crate::target::{BatchResult, TargetStore};
use crate::transform::Transformer;

/// Run lifecycle.
///
/// Per-record and per-batch failures do not leave `Streaming`; only
/// connection-level and page-fetch errors reach `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started.
    Idle,
    /// Connecting and taking informational row counts.
    Counting,
    /// Scanning, transforming and applying batches.
    Streaming,
    /// Scan exhausted, summary emitted.
    Completed,
    /// Terminated by a fatal error.
    Aborted,
}

/// Migration pipeline: scan -> transform -> (enrich) -> write -> track.
pub struct Pipeline {
    source: Box<dyn RecordSource>,
    /// `None` in dry-run mode.
    target: Option<Box<dyn TargetStore>>,
    /// Present only on the ingestion path; migration never geocodes.
    enricher: Option<GeocodeEnricher>,
    transformer: Transformer,
    options: MigrationOptions,
    state: RunState,
}

impl Pipeline {
    /// Builds a pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration names a store this build
    /// does not support or the geocoding client cannot be constructed.
    pub fn from_config(config: MigrationConfig) -> Result<Self> {
        let source: Box<dyn RecordSource> = match &config.source {
            SourceConfig::Postgres(cfg) => {
                #[cfg(feature = "postgres")]
                {
                    Box::new(crate::sources::postgres::PostgresSource::new(cfg.clone()))
                }
                #[cfg(not(feature = "postgres"))]
                {
                    let _ = cfg;
                    return Err(Error::Config(
                        "postgres sources require the 'postgres' feature".to_string(),
                    ));
                }
            }
            SourceConfig::Ndjson(cfg) => Box::new(NdjsonSource::new(cfg.clone())),
        };

        let enricher = match &config.source {
            SourceConfig::Ndjson(cfg) if cfg.geocoding.enabled => {
                Some(GeocodeEnricher::new(&cfg.geocoding)?)
            }
            _ => None,
        };

        let target: Option<Box<dyn TargetStore>> = if config.options.dry_run {
            info!("Dry run mode - not writing to target");
            None
        } else {
            #[cfg(feature = "postgres")]
            {
                Some(Box::new(crate::target::postgres::PostgresTarget::new(
                    config.target.clone(),
                )))
            }
            #[cfg(not(feature = "postgres"))]
            {
                return Err(Error::Config(
                    "postgres targets require the 'postgres' feature".to_string(),
                ));
            }
        };

        Ok(Self::new(source, target, enricher, config.options))
    }

    /// Assembles a pipeline from its parts.
    #[must_use]
    pub fn new(
        source: Box<dyn RecordSource>,
        target: Option<Box<dyn TargetStore>>,
        enricher: Option<GeocodeEnricher>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            target,
            enricher,
            transformer: Transformer::new(),
            options,
            state: RunState::Idle,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs the migration to completion.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that aborted the run; skip-level failures
    /// are absorbed into the returned statistics instead.
    pub async fn run(&mut self) -> Result<MigrationStats> {
        match self.run_inner().await {
            Ok(stats) => {
                self.state = RunState::Completed;
                Ok(stats)
            }
            Err(e) => {
                self.state = RunState::Aborted;
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self) -> Result<MigrationStats> {
        info!("Starting migration pipeline ({})", self.source.source_type());
        self.state = RunState::Counting;

        self.source.connect().await?;
        if let Some(target) = self.target.as_mut() {
            target.connect().await?;
        }

        // Counting is for reporting only; it does not gate correctness.
        let source_count = self.source.count().await?;
        let target_before = match self.target.as_ref() {
            Some(target) => Some(target.count().await?),
            None => None,
        };
        if let Some(count) = source_count {
            info!("Source rows matching filter: {}", count);
        }
        if let Some(existing) = target_before {
            if existing > 0 {
                warn!(
                    "Target already has {} rows; duplicate ids will be skipped",
                    existing
                );
            }
        }

        let mut cursor = self.load_resume_cursor()?;
        if let Some(resume) = &cursor {
            info!("Resuming after checkpoint cursor {:?}", resume);
        }

        self.state = RunState::Streaming;
        let progress = create_progress_bar(source_count.unwrap_or(0));
        let mut tracker = ProgressTracker::new();
        let mut exhausted = false;

        loop {
            let remaining = self
                .options
                .limit
                .map(|limit| limit.saturating_sub(tracker.processed()));
            if remaining == Some(0) {
                info!("Record limit reached");
                break;
            }

            let mut batch = match self
                .source
                .fetch_batch(cursor.clone(), self.options.batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    abort_summary(&tracker, &e);
                    return Err(e);
                }
            };
            tracker.record_unreadable_lines(&batch.skipped_lines);
            if batch.records.is_empty() {
                exhausted = true;
                break;
            }
            if let Some(remaining) = remaining {
                apply_limit(&mut batch, remaining);
            }

            // Transform, enriching ingestion records that lack coordinates
            let mut records: Vec<BusinessRecord> = Vec::with_capacity(batch.records.len());
            for raw in batch.records {
                let line = raw.line;
                match self.transformer.transform(raw) {
                    Ok(mut record) => {
                        if let Some(enricher) = self.enricher.as_mut() {
                            enrich(enricher, &mut record).await;
                        }
                        records.push(record);
                    }
                    Err(e) => {
                        warn!("Skipping record: {}", e);
                        tracker.record_transform_skip(line);
                    }
                }
            }

            let attempted = records.len() as u64;
            match self.target.as_mut() {
                Some(target) => match target.apply(&records).await {
                    Ok(result) => tracker.record(result),
                    Err(e) if !e.is_fatal() => {
                        warn!("Batch rolled back ({} rows): {}", attempted, e);
                        tracker.record_failed_batch(attempted);
                    }
                    Err(e) => {
                        abort_summary(&tracker, &e);
                        return Err(e);
                    }
                },
                None => tracker.record(BatchResult {
                    attempted,
                    affected: attempted,
                }),
            }

            progress.inc(attempted);
            cursor = batch.next_cursor;
            self.save_checkpoint(cursor.as_ref());

            if !batch.has_more {
                exhausted = true;
                break;
            }
        }

        progress.finish_with_message("Migration complete");

        // Cleanup and reconciliation are verification aids; a failure here
        // must not turn a committed run into an aborted one.
        if let Err(e) = self.source.close().await {
            warn!("Failed to close source: {}", e);
        }

        let stats = tracker.summary();

        if let (Some(target), Some(before)) = (self.target.as_mut(), target_before) {
            match target.count().await {
                Ok(after) => {
                    let delta = after.saturating_sub(before);
                    if delta != stats.migrated {
                        warn!(
                            "Target grew by {} rows but {} inserts were recorded",
                            delta, stats.migrated
                        );
                    }
                }
                Err(e) => warn!("Post-run target count failed: {}", e),
            }
            if let Err(e) = target.close().await {
                warn!("Failed to close target: {}", e);
            }
        }

        // A limit-stopped run keeps its checkpoint so a later resume picks
        // up where the trial left off.
        if exhausted {
            self.clear_checkpoint();
        }

        info!(
            "Migration complete: {} processed, {} migrated, {} duplicate skips, {} error skips in {:.2}s ({:.0} rec/sec)",
            stats.processed,
            stats.migrated,
            stats.skipped_duplicates,
            stats.skipped_errors,
            stats.duration_secs,
            stats.throughput()
        );

        Ok(stats)
    }

    fn load_resume_cursor(&self) -> Result<Option<Cursor>> {
        if !self.options.resume {
            return Ok(None);
        }
        match &self.options.checkpoint_path {
            Some(path) => checkpoint::load(path),
            None => Err(Error::Config(
                "resume requires a checkpoint_path".to_string(),
            )),
        }
    }

    fn save_checkpoint(&self, cursor: Option<&Cursor>) {
        // A dry run commits nothing, so it records no positions.
        if self.target.is_none() {
            return;
        }
        let (Some(path), Some(cursor)) = (&self.options.checkpoint_path, cursor) else {
            return;
        };
        if let Err(e) = checkpoint::save(path, cursor) {
            // A lost checkpoint only costs a rescan on restart
            warn!("Failed to save checkpoint: {}", e);
        }
    }

    fn clear_checkpoint(&self) {
        if self.target.is_none() {
            return;
        }
        if let Some(path) = &self.options.checkpoint_path {
            if let Err(e) = checkpoint::clear(path) {
                warn!("Failed to clear checkpoint: {}", e);
            }
        }
    }
}

/// Trims a fetched page to the remaining record budget.
///
/// The cursor is repointed at the last retained record, so the checkpoint
/// never advances past rows that were not attempted.
fn apply_limit(batch: &mut RecordBatch, remaining: u64) {
    if batch.records.len() as u64 <= remaining {
        return;
    }
    batch.records.truncate(remaining as usize);
    batch.next_cursor = batch.records.last().and_then(record_cursor);
}

/// Scan position of a single record: its input line for file sources, its
/// id for keyset-paginated stores.
fn record_cursor(raw: &RawRecord) -> Option<Cursor> {
    match (raw.line, &raw.id) {
        (Some(offset), _) => Some(Cursor::Offset { offset }),
        (None, Some(id)) => Some(Cursor::AfterId { id: id.clone() }),
        (None, None) => None,
    }
}

/// Reports what a run accomplished before a fatal error terminated it.
fn abort_summary(tracker: &ProgressTracker, cause: &Error) {
    error!(
        "Aborting after {} records processed, {} migrated: {}",
        tracker.processed(),
        tracker.migrated(),
        cause
    );
}

/// Resolves coordinates for a record that has none.
async fn enrich(enricher: &mut GeocodeEnricher, record: &mut BusinessRecord) {
    if record.latitude.is_some() {
        return;
    }
    let (Some(postal_code), Some(city)) = (record.postal_code.clone(), record.city.clone()) else {
        return;
    };
    let coords = enricher
        .resolve(record.street_address.as_deref(), &postal_code, &city)
        .await;
    record.set_coordinates(coords);
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}
