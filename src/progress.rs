//! Progress accounting for a migration run.

use std::time::Instant;

use crate::target::BatchResult;

/// Final statistics for a run.
#[derive(Debug, Default, Clone)]
pub struct MigrationStats {
    /// Records pulled from the source and attempted.
    pub processed: u64,
    /// Rows actually inserted into the target.
    pub migrated: u64,
    /// Rows skipped because their id already existed.
    pub skipped_duplicates: u64,
    /// Rows skipped due to per-record or per-batch errors.
    pub skipped_errors: u64,
    /// Batches applied (including rolled-back ones).
    pub batches: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// 1-based input line numbers skipped as unreadable (file sources).
    pub skipped_lines: Vec<u64>,
}

impl MigrationStats {
    /// Calculate throughput (records per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.processed as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    /// All skipped rows, duplicates and errors together.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped_duplicates + self.skipped_errors
    }
}

/// Accumulates counts while the pipeline streams batches.
///
/// Every processed record lands in exactly one of `migrated`,
/// `skipped_duplicates` or `skipped_errors`. Unreadable input lines never
/// became records; they count toward `skipped_errors` but not `processed`.
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    processed: u64,
    migrated: u64,
    skipped_duplicates: u64,
    skipped_errors: u64,
    batches: u64,
    skipped_lines: Vec<u64>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    /// Starts tracking; the clock runs from here.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            processed: 0,
            migrated: 0,
            skipped_duplicates: 0,
            skipped_errors: 0,
            batches: 0,
            skipped_lines: Vec::new(),
        }
    }

    /// Records a committed batch.
    pub fn record(&mut self, result: BatchResult) {
        self.processed += result.attempted;
        self.migrated += result.affected;
        self.skipped_duplicates += result.duplicates();
        self.batches += 1;
    }

    /// Records a rolled-back batch: all of its rows count as error skips.
    pub fn record_failed_batch(&mut self, attempted: u64) {
        self.processed += attempted;
        self.skipped_errors += attempted;
        self.batches += 1;
    }

    /// Records one record dropped before it reached the writer.
    pub fn record_transform_skip(&mut self, line: Option<u64>) {
        self.processed += 1;
        self.skipped_errors += 1;
        if let Some(line) = line {
            self.skipped_lines.push(line);
        }
    }

    /// Records input lines dropped by the source as unreadable.
    pub fn record_unreadable_lines(&mut self, lines: &[u64]) {
        self.skipped_errors += lines.len() as u64;
        self.skipped_lines.extend_from_slice(lines);
    }

    /// Records processed so far.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Rows inserted so far.
    #[must_use]
    pub fn migrated(&self) -> u64 {
        self.migrated
    }

    /// Final counts with the elapsed duration.
    #[must_use]
    pub fn summary(&self) -> MigrationStats {
        MigrationStats {
            processed: self.processed,
            migrated: self.migrated,
            skipped_duplicates: self.skipped_duplicates,
            skipped_errors: self.skipped_errors,
            batches: self.batches,
            duration_secs: self.started.elapsed().as_secs_f64(),
            skipped_lines: self.skipped_lines.clone(),
        }
    }
}
