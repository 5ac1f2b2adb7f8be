//! Dedup & Outlier Marker.
//!
//! Two independent, idempotent passes over a staged batch: collapse
//! in-batch duplicates to one representative per `row_hash`, then mark
//! statistical outliers against *production* price distribution (never the
//! batch's own prices, so bounds don't shift under their own outliers).

use crate::run_context::RunContext;
use sqlx::PgPool;
use uuid::Uuid;

/// Keeps the lowest-`id` row per `row_hash` within the batch, deletes the
/// rest. Returns the surviving row count.
pub async fn dedup_batch(pool: &PgPool, batch_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query(
        r#"
        DELETE FROM transactions_staging
        WHERE batch_id = $1
          AND id NOT IN (
              SELECT MIN(id) FROM transactions_staging WHERE batch_id = $1 GROUP BY row_hash
          )
        "#,
    )
    .bind(batch_id)
    .execute(pool)
    .await?;

    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions_staging WHERE batch_id = $1")
        .bind(batch_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Marks staging rows whose `price` falls outside `[Q1 - k*IQR, Q3 + k*IQR]`,
/// bounds computed from current production non-outlier rows. A no-op when
/// fewer than 3 distinct production prices exist (bounds would be
/// degenerate). Returns the number of rows marked this call.
pub async fn mark_outliers(pool: &PgPool, batch_id: Uuid, iqr_multiplier: f64) -> Result<i64, sqlx::Error> {
    let (q1, q3): (Option<f64>, Option<f64>) = sqlx::query_as(
        r#"
        SELECT
            PERCENTILE_CONT(0.25) WITHIN GROUP (ORDER BY price) AS q1,
            PERCENTILE_CONT(0.75) WITHIN GROUP (ORDER BY price) AS q3
        FROM transactions
        WHERE NOT is_outlier
          AND (SELECT COUNT(DISTINCT price) FROM transactions WHERE NOT is_outlier) > 2
        "#,
    )
    .fetch_one(pool)
    .await?;

    // An empty production table, or one with <=2 distinct prices, excludes
    // every row via the subquery guard above; the aggregate still returns
    // exactly one row (no GROUP BY), just with NULL bounds.
    let (Some(q1), Some(q3)) = (q1, q3) else {
        return Ok(0);
    };

    let iqr = q3 - q1;
    let lower = q1 - iqr_multiplier * iqr;
    let upper = q3 + iqr_multiplier * iqr;

    let result = sqlx::query(
        r#"
        UPDATE transactions_staging
        SET is_outlier = TRUE
        WHERE batch_id = $1 AND (price < $2 OR price > $3) AND NOT is_outlier
        "#,
    )
    .bind(batch_id)
    .bind(lower)
    .bind(upper)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as i64)
}

/// Runs dedup then outlier marking, recording both counts on `run_ctx`.
pub async fn run(pool: &PgPool, run_ctx: &mut RunContext, iqr_multiplier: f64) -> Result<(), sqlx::Error> {
    let after_dedup = dedup_batch(pool, run_ctx.batch_id).await?;
    run_ctx.rows_after_dedup = after_dedup as u64;

    let marked = mark_outliers(pool, run_ctx.batch_id, iqr_multiplier).await?;
    run_ctx.rows_outliers_marked = marked as u64;

    Ok(())
}
