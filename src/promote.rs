//! Atomic Promoter: staging -> production in one transaction, no reader
//! ever observing a partial batch.
//!
//! No table rename, no partial swap. Production is append-only; the unique
//! index on `row_hash` is the collision primitive, so promotion is simply
//! "insert what staging has, skip what production already has."

use crate::run_context::RunContext;
use sqlx::PgPool;
use uuid::Uuid;

/// Promotes all staging rows for `batch_id` into production. On any
/// failure the transaction rolls back and staging rows are left in place
/// for forensic inspection; the caller is responsible for marking the
/// ledger failed.
pub async fn promote_batch(pool: &PgPool, batch_id: Uuid) -> Result<(i64, i64), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let staged_count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM transactions_staging WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_one(&mut *tx)
            .await?;

    let promoted = sqlx::query(
        r#"
        INSERT INTO transactions
            (row_hash, project_name, transaction_date, price, area_sqft, psf,
             district, region, bedroom_count, sale_type, floor_range, tenure,
             lease_start_year, tenure_class, is_outlier, source, run_id)
        SELECT
            row_hash, project_name, transaction_date, price, area_sqft, psf,
            district, region, bedroom_count, sale_type, floor_range, tenure,
            lease_start_year, tenure_class, is_outlier, 'csv', $1
        FROM transactions_staging
        WHERE batch_id = $1
        ON CONFLICT (row_hash) DO NOTHING
        "#,
    )
    .bind(batch_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM transactions_staging WHERE batch_id = $1")
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let rows_promoted = promoted.rows_affected() as i64;
    let rows_skipped_collision = staged_count.0 - rows_promoted;
    Ok((rows_promoted, rows_skipped_collision))
}

/// Runs promotion and records `rows_promoted`/`rows_skipped_collision` on
/// `run_ctx`.
pub async fn run(pool: &PgPool, run_ctx: &mut RunContext) -> Result<(), sqlx::Error> {
    let (promoted, skipped_collision) = promote_batch(pool, run_ctx.batch_id).await?;
    run_ctx.rows_promoted = promoted as u64;
    run_ctx.rows_skipped_collision = skipped_collision as u64;
    Ok(())
}
