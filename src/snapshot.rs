//! Snapshot Refresher: recomputes a fixed set of headline statistics after
//! a successful promotion and writes them into `precomputed_stats`.
//!
//! Consumers that only need fast, filter-free headline numbers (dashboard
//! tiles) read from this table instead of going through the aggregation
//! engine, which is optimized for arbitrary filtered queries, not for
//! "give me everything, right now."

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

/// Refreshes every headline stat in one transaction per stat. A failure on
/// one stat does not block the others; each is independently best-effort
/// since none of them gate promotion's success.
pub async fn refresh_all(pool: &PgPool, batch_id: Uuid) -> Result<(), sqlx::Error> {
    refresh_median_psf_by_region_last_6_months(pool, batch_id).await?;
    refresh_quarterly_volumes_last_5_quarters(pool, batch_id).await?;
    Ok(())
}

async fn refresh_median_psf_by_region_last_6_months(pool: &PgPool, batch_id: Uuid) -> Result<(), sqlx::Error> {
    let rows: Vec<(String, f64)> = sqlx::query_as(
        r#"
        SELECT region, PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY psf) AS median_psf
        FROM transactions
        WHERE NOT is_outlier AND transaction_date >= (CURRENT_DATE - INTERVAL '6 months')
        GROUP BY region
        "#,
    )
    .fetch_all(pool)
    .await?;

    let row_count = rows.len() as i64;
    let value = json!(rows
        .into_iter()
        .map(|(region, median_psf)| json!({ "region": region, "median_psf": median_psf }))
        .collect::<Vec<_>>());

    upsert_stat(pool, "median_psf_by_region_last_6_months", &value, row_count, batch_id).await
}

async fn refresh_quarterly_volumes_last_5_quarters(pool: &PgPool, batch_id: Uuid) -> Result<(), sqlx::Error> {
    let rows: Vec<(i32, i32, i64)> = sqlx::query_as(
        r#"
        SELECT
            EXTRACT(YEAR FROM transaction_date)::int AS year,
            EXTRACT(QUARTER FROM transaction_date)::int AS quarter,
            COUNT(*) AS volume
        FROM transactions
        WHERE NOT is_outlier AND transaction_date >= (CURRENT_DATE - INTERVAL '15 months')
        GROUP BY year, quarter
        ORDER BY year DESC, quarter DESC
        LIMIT 5
        "#,
    )
    .fetch_all(pool)
    .await?;

    let row_count = rows.len() as i64;
    let value = json!(rows
        .into_iter()
        .map(|(year, quarter, volume)| json!({
            "quarter": format!("{year}-Q{quarter}"),
            "volume": volume,
        }))
        .collect::<Vec<_>>());

    upsert_stat(pool, "quarterly_volumes_last_5_quarters", &value, row_count, batch_id).await
}

async fn upsert_stat(
    pool: &PgPool,
    stat_key: &str,
    stat_value: &serde_json::Value,
    row_count: i64,
    batch_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO precomputed_stats (stat_key, stat_value, row_count, computed_at, source_batch_id)
        VALUES ($1, $2, $3, now(), $4)
        ON CONFLICT (stat_key) DO UPDATE
        SET stat_value = EXCLUDED.stat_value, row_count = EXCLUDED.row_count, computed_at = now(),
            source_batch_id = EXCLUDED.source_batch_id
        "#,
    )
    .bind(stat_key)
    .bind(stat_value)
    .bind(row_count)
    .bind(batch_id)
    .execute(pool)
    .await?;
    Ok(())
}
