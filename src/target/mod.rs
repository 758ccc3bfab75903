//! Target stores: dedup-safe batch application of business records.

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::BusinessRecord;

/// Outcome of applying one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Number of records in the batch.
    pub attempted: u64,
    /// Number of rows actually inserted.
    pub affected: u64,
}

impl BatchResult {
    /// Rows silently skipped because their id already existed.
    ///
    /// Relies on the driver reporting a true per-row affected count for the
    /// bulk statement; Postgres command tags do.
    #[must_use]
    pub fn duplicates(&self) -> u64 {
        self.attempted.saturating_sub(self.affected)
    }
}

/// Trait for target stores.
///
/// `apply` executes the whole batch as a single transaction with
/// conflict-skip semantics keyed on `id`: existing rows are left untouched
/// and are not errors. On any failure within the transaction the entire
/// batch rolls back and the error is reported at batch granularity; no
/// row-by-row retry is performed.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Opens the target and validates its configuration.
    async fn connect(&mut self) -> Result<()>;

    /// Current number of rows in the target table.
    async fn count(&self) -> Result<u64>;

    /// Applies a batch transactionally with conflict-skip semantics.
    async fn apply(&mut self, batch: &[BusinessRecord]) -> Result<BatchResult>;

    /// Closes the target and releases resources.
    async fn close(&mut self) -> Result<()>;
}
