//! Connection pool construction and schema DDL.
//!
//! The DDL is kept as a single const string applied idempotently
//! (`CREATE TABLE IF NOT EXISTS`) at startup, rather than a migrations
//! framework -- this crate has one schema and no migration history to
//! replay.

use sqlx::postgres::{PgPoolOptions, PgSslMode};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let connect_options = sqlx::postgres::PgConnectOptions::from_str(database_url)?
        .ssl_mode(PgSslMode::Prefer)
        .disable_statement_logging();

    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

/// Holds a session-level Postgres advisory lock, released explicitly via
/// `release()`. Keyed on a stable hash of the dataset name so two ingest
/// runs against the same dataset serialize while runs against different
/// datasets proceed independently.
///
/// Takes a dedicated connection out of the pool for the lock's lifetime --
/// `pg_advisory_lock` is session-scoped, so the lock would vanish the
/// moment a pooled connection was returned and reused for something else.
pub struct DatasetLock {
    conn: sqlx::pool::PoolConnection<sqlx::Postgres>,
    key: i64,
}

impl DatasetLock {
    /// Blocks until the lock for `dataset` is acquired on a checked-out
    /// connection. One ingest run per dataset proceeds at a time; a second
    /// concurrent run against the same dataset queues here rather than
    /// racing the first through staging/dedup/promote.
    pub async fn acquire(pool: &PgPool, dataset: &str) -> Result<Self, sqlx::Error> {
        let key = advisory_key(dataset);
        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(&mut *conn)
            .await?;
        Ok(Self { conn, key })
    }

    pub async fn release(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

/// Folds a dataset name into the `i64` key `pg_advisory_lock` takes. Uses
/// the low 8 bytes of the fingerprint hash rather than a separate hash
/// function -- any well-distributed digest works here, and this crate
/// already links one.
fn advisory_key(dataset: &str) -> i64 {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(dataset.as_bytes());
    i64::from_be_bytes(digest[0..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id                  BIGSERIAL PRIMARY KEY,
    row_hash            TEXT NOT NULL UNIQUE,
    project_name        TEXT NOT NULL,
    transaction_date    DATE NOT NULL,
    price               DOUBLE PRECISION NOT NULL,
    area_sqft           DOUBLE PRECISION NOT NULL,
    psf                 DOUBLE PRECISION NOT NULL,
    district            TEXT NOT NULL,
    region              TEXT NOT NULL,
    bedroom_count       SMALLINT NOT NULL,
    sale_type           TEXT NOT NULL,
    floor_range         TEXT,
    tenure              TEXT,
    lease_start_year    INTEGER,
    tenure_class        TEXT,
    is_outlier          BOOLEAN NOT NULL DEFAULT FALSE,
    source              TEXT NOT NULL DEFAULT 'csv',
    run_id              UUID NOT NULL,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_transactions_district ON transactions (district) WHERE NOT is_outlier;
CREATE INDEX IF NOT EXISTS idx_transactions_sale_type ON transactions (sale_type) WHERE NOT is_outlier;
CREATE INDEX IF NOT EXISTS idx_transactions_project ON transactions (project_name);
CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions (transaction_date);

CREATE TABLE IF NOT EXISTS transactions_staging (
    id                  BIGSERIAL PRIMARY KEY,
    batch_id            UUID NOT NULL,
    row_hash            TEXT NOT NULL,
    project_name        TEXT NOT NULL,
    transaction_date    DATE NOT NULL,
    price               DOUBLE PRECISION NOT NULL,
    area_sqft           DOUBLE PRECISION NOT NULL,
    psf                 DOUBLE PRECISION NOT NULL,
    district            TEXT NOT NULL,
    region              TEXT NOT NULL,
    bedroom_count       SMALLINT NOT NULL,
    sale_type           TEXT NOT NULL,
    floor_range         TEXT,
    tenure              TEXT,
    lease_start_year    INTEGER,
    tenure_class        TEXT,
    is_valid            BOOLEAN NOT NULL DEFAULT TRUE,
    is_duplicate        BOOLEAN NOT NULL DEFAULT FALSE,
    is_outlier          BOOLEAN NOT NULL DEFAULT FALSE,
    validation_errors   JSONB,
    source_file         TEXT NOT NULL,
    source_row_number   INTEGER NOT NULL,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_staging_batch ON transactions_staging (batch_id);
CREATE INDEX IF NOT EXISTS idx_staging_row_hash ON transactions_staging (batch_id, row_hash);

CREATE TABLE IF NOT EXISTS etl_batches (
    batch_id                UUID PRIMARY KEY,
    schema_version          TEXT NOT NULL,
    rules_version           TEXT NOT NULL,
    contract_hash           TEXT NOT NULL,
    header_fingerprint      TEXT NOT NULL,
    batch_fingerprint       TEXT NOT NULL DEFAULT '',
    run_mode                TEXT NOT NULL,
    status                  TEXT NOT NULL,
    started_at              TIMESTAMPTZ NOT NULL,
    completed_at            TIMESTAMPTZ,
    file_fingerprints       JSONB NOT NULL DEFAULT '{}'::jsonb,
    total_files             INTEGER NOT NULL DEFAULT 0,
    contract_report         JSONB,
    source_row_count        BIGINT,
    rows_rejected           BIGINT NOT NULL DEFAULT 0,
    rows_skipped            BIGINT NOT NULL DEFAULT 0,
    rows_loaded             BIGINT NOT NULL DEFAULT 0,
    rows_after_dedup        BIGINT NOT NULL DEFAULT 0,
    rows_outliers_marked    BIGINT NOT NULL DEFAULT 0,
    rows_promoted           BIGINT NOT NULL DEFAULT 0,
    rows_skipped_collision  BIGINT NOT NULL DEFAULT 0,
    validation_issues       JSONB NOT NULL DEFAULT '[]'::jsonb,
    semantic_warnings       JSONB NOT NULL DEFAULT '[]'::jsonb,
    validation_passed       BOOLEAN NOT NULL DEFAULT TRUE,
    error_message           TEXT,
    error_stage              TEXT,
    triggered_by            TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_etl_batches_started_at ON etl_batches (started_at DESC);

CREATE TABLE IF NOT EXISTS precomputed_stats (
    stat_key        TEXT PRIMARY KEY,
    stat_value      JSONB NOT NULL,
    row_count       BIGINT NOT NULL DEFAULT 0,
    computed_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    source_batch_id UUID
);

-- Populated out-of-band by an inventory-sync collaborator (outside this
-- crate's scope); read-only from here. Backs the aggregation engine's
-- total_units/percent_sold/unsold_inventory post-processing.
CREATE TABLE IF NOT EXISTS project_inventory (
    project_name    TEXT PRIMARY KEY,
    total_units     BIGINT NOT NULL,
    unit_source     TEXT,
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_sql_defines_all_four_tables() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS transactions "));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS transactions_staging"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS etl_batches"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS precomputed_stats"));
    }
}
