//! `PostgreSQL` target store with transactional conflict-skip inserts.

use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder, Row};

use crate::config::TargetConfig;
use crate::error::{Error, Result};
use crate::record::{BusinessRecord, SRID};
use crate::sources::postgres::connect_pool;
use crate::target::{BatchResult, TargetStore};

/// Postgres caps bind parameters at 65535 per statement; at 16 columns a
/// 5000-row batch would exceed it. Oversized batches are split into
/// multiple statements inside the same transaction, so atomicity stays at
/// batch granularity.
const MAX_ROWS_PER_INSERT: usize = 2000;

/// Informational size figures for the target, not on the correctness path.
#[derive(Debug, Clone)]
pub struct TargetReport {
    /// Row count of the target table.
    pub row_count: u64,
    /// Pretty-printed database size.
    pub database_size: String,
    /// Pretty-printed total relation size of the target table.
    pub table_size: String,
}

/// Target store writing into a `businesses`-shaped table.
pub struct PostgresTarget {
    config: TargetConfig,
    pool: Option<PgPool>,
}

impl PostgresTarget {
    /// Creates a new `PostgreSQL` target.
    #[must_use]
    pub fn new(config: TargetConfig) -> Self {
        Self { config, pool: None }
    }

    fn pool(&self) -> Result<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| Error::TargetConnection("Target not connected".to_string()))
    }

    /// Row count plus database and table sizes, for reporting.
    ///
    /// # Errors
    ///
    /// Returns an error when the target cannot be queried.
    pub async fn report(&self) -> Result<TargetReport> {
        let pool = self.pool()?;
        let row_count = self.count().await?;
        let sizes = sqlx::query(
            "SELECT pg_size_pretty(pg_database_size(current_database())) AS db_size, \
                    pg_size_pretty(pg_total_relation_size($1)) AS table_size",
        )
        .bind(&self.config.table)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::TargetConnection(format!("Size query failed: {e}")))?;

        Ok(TargetReport {
            row_count,
            database_size: sizes
                .try_get("db_size")
                .map_err(|e| Error::TargetConnection(e.to_string()))?,
            table_size: sizes
                .try_get("table_size")
                .map_err(|e| Error::TargetConnection(e.to_string()))?,
        })
    }
}

#[async_trait]
impl TargetStore for PostgresTarget {
    async fn connect(&mut self) -> Result<()> {
        let pool = connect_pool(&self.config.connection)
            .await
            .map_err(|e| Error::TargetConnection(format!("Failed to open target: {e}")))?;
        self.pool = Some(pool);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.config.table);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(self.pool()?)
            .await
            .map_err(|e| Error::TargetConnection(format!("Target count failed: {e}")))?;
        Ok(count.max(0) as u64)
    }

    async fn apply(&mut self, batch: &[BusinessRecord]) -> Result<BatchResult> {
        if batch.is_empty() {
            return Ok(BatchResult::default());
        }

        let pool = self.pool()?.clone();
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| Error::Loading(format!("Failed to begin transaction: {e}")))?;

        let mut affected = 0u64;
        for chunk in batch.chunks(MAX_ROWS_PER_INSERT) {
            let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} (id, name, street_address, postal_code, city, district, \
                 categories, phone, email, website, latitude, longitude, geometry, \
                 is_active, embedding, opening_hours) ",
                self.config.table
            ));

            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.id.clone());
                b.push_bind(r.name.clone());
                b.push_bind(r.street_address.clone());
                b.push_bind(r.postal_code.clone());
                b.push_bind(r.city.clone());
                b.push_bind(r.district.clone());
                b.push_bind(r.categories.clone());
                b.push_bind(r.phone.clone());
                b.push_bind(r.email.clone());
                b.push_bind(r.website.clone());
                b.push_bind(r.latitude);
                b.push_bind(r.longitude);
                // The geometry column is always the point derived from the
                // coordinate pair, in WGS84.
                b.push("ST_GeomFromText(");
                b.push_bind_unseparated(r.geometry_wkt());
                b.push_unseparated(format!(", {SRID})"));
                b.push_bind(r.is_active);
                b.push_bind(r.embedding.clone());
                b.push_unseparated("::vector");
                b.push_bind(r.opening_hours.clone());
            });
            qb.push(" ON CONFLICT (id) DO NOTHING");

            let result = qb
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Loading(format!("Batch insert failed: {e}")))?;
            affected += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| Error::Loading(format!("Commit failed: {e}")))?;

        Ok(BatchResult {
            attempted: batch.len() as u64,
            affected,
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        Ok(())
    }
}
