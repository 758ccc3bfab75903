//! `PostgreSQL` source store: keyset-paginated, read-only scan.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::config::{DbConfig, PostgresSourceConfig};
use crate::error::{Error, Result};
use crate::sources::{Cursor, RawRecord, RecordBatch, RecordSource};

/// Builds a connection pool from structured parameters.
///
/// # Errors
///
/// Returns the driver error when the store is unreachable.
pub(crate) async fn connect_pool(db: &DbConfig) -> std::result::Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .database(&db.database)
        .username(&db.user)
        .password(&db.password);
    PgPoolOptions::new()
        .max_connections(db.pool_size)
        .acquire_timeout(db.timeout())
        .connect_with(options)
        .await
}

/// Keyset-paginated scan over the source `businesses` table.
///
/// Batches are ordered ascending by `id` and resume strictly after the
/// cursor id, so a restart never skips or repeats committed rows even when
/// the source grows behind the cursor. The generated `search_vector`
/// column is excluded from the projection; the target recomputes it.
pub struct PostgresSource {
    config: PostgresSourceConfig,
    pool: Option<PgPool>,
}

impl PostgresSource {
    /// Creates a new `PostgreSQL` source.
    #[must_use]
    pub fn new(config: PostgresSourceConfig) -> Self {
        Self { config, pool: None }
    }

    fn pool(&self) -> Result<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| Error::SourceConnection("Source not connected".to_string()))
    }
}

fn row_to_raw(row: &PgRow) -> std::result::Result<RawRecord, sqlx::Error> {
    Ok(RawRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        street_address: row.try_get("street_address")?,
        postal_code: row.try_get("postal_code")?,
        city: row.try_get("city")?,
        district: row.try_get("district")?,
        categories: row.try_get("categories")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        website: row.try_get("website")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        geometry_wkt: row.try_get("geometry_wkt")?,
        is_active: row.try_get("is_active")?,
        embedding: row.try_get("embedding")?,
        opening_hours: row.try_get("opening_hours")?,
        ..RawRecord::default()
    })
}

#[async_trait]
impl RecordSource for PostgresSource {
    fn source_type(&self) -> &'static str {
        "postgres"
    }

    async fn connect(&mut self) -> Result<()> {
        let pool = connect_pool(&self.config.connection)
            .await
            .map_err(|e| Error::SourceConnection(format!("Failed to open source: {e}")))?;
        self.pool = Some(pool);
        Ok(())
    }

    async fn count(&self) -> Result<Option<u64>> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE ($1::text IS NULL OR city = $1)",
            self.config.table
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(self.config.city.as_deref())
            .fetch_one(self.pool()?)
            .await
            .map_err(|e| Error::SourceConnection(format!("Source count failed: {e}")))?;
        Ok(Some(count.max(0) as u64))
    }

    async fn fetch_batch(
        &mut self,
        cursor: Option<Cursor>,
        batch_size: usize,
    ) -> Result<RecordBatch> {
        let after_id = match cursor {
            Some(Cursor::AfterId { id }) => Some(id),
            Some(Cursor::Offset { .. }) => {
                return Err(Error::Extraction(
                    "Postgres source paginates by id keyset, not by offset".to_string(),
                ));
            }
            None => None,
        };

        let sql = format!(
            "SELECT id, name, street_address, postal_code, city, district, \
                    categories, phone, email, website, latitude, longitude, \
                    ST_AsText(geometry) AS geometry_wkt, \
                    is_active, embedding::text AS embedding, opening_hours \
             FROM {} \
             WHERE ($1::text IS NULL OR id > $1) \
               AND ($2::text IS NULL OR city = $2) \
             ORDER BY id \
             LIMIT $3",
            self.config.table
        );

        let rows = sqlx::query(&sql)
            .bind(after_id.as_deref())
            .bind(self.config.city.as_deref())
            .bind(batch_size as i64)
            .fetch_all(self.pool()?)
            .await
            .map_err(|e| Error::Extraction(format!("Page fetch failed: {e}")))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(
                row_to_raw(row).map_err(|e| Error::Extraction(format!("Bad source row: {e}")))?,
            );
        }

        let has_more = records.len() == batch_size;
        let next_cursor = records
            .last()
            .and_then(|r| r.id.clone())
            .map(|id| Cursor::AfterId { id });

        Ok(RecordBatch {
            records,
            next_cursor,
            has_more,
            skipped_lines: Vec::new(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        Ok(())
    }
}
