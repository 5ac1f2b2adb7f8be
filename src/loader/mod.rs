//! Staging Loader: CSV -> `transactions_staging`.
//!
//! One file at a time, one `RunContext` carried through all of them. Never
//! aborts a batch for a single bad row -- only a file-level IO/parse error
//! or a contract mismatch is fatal (see `CoreError::exit_code`).

mod coerce;
mod date_parse;

use crate::contract::SchemaContract;
use crate::error::CoreError;
use crate::fingerprint::{self, HashField};
use crate::models::TenureClass;
use crate::rules::{RuleInputs, RuleName, RuleRegistry};
use crate::run_context::RunContext;
use sqlx::PgPool;
use std::path::Path;

pub use date_parse::parse_transaction_date;

/// One coerced, classified, hashed row ready for `transactions_staging`.
#[derive(Debug, Clone)]
pub struct StagingRow {
    pub batch_id: uuid::Uuid,
    pub row_hash: String,
    pub project_name: String,
    pub transaction_date: chrono::NaiveDate,
    pub price: f64,
    pub area_sqft: f64,
    pub psf: f64,
    pub district: String,
    pub region: String,
    pub bedroom_count: i16,
    pub sale_type: String,
    pub floor_range: Option<String>,
    pub tenure: Option<String>,
    pub lease_start_year: Option<i32>,
    pub tenure_class: Option<TenureClass>,
    pub source_file: String,
    pub source_row_number: i32,
}

/// Resolves the canonical three-way tenure bucket from the normalized
/// tenure string and its remaining-lease figure. The `999` sentinel and the
/// literal "999-year Leasehold" string both collapse to `Y999` here so
/// downstream consumers never re-derive this themselves.
pub fn derive_tenure_class(tenure_normalized: &str, remaining_lease: Option<i64>) -> Option<TenureClass> {
    if tenure_normalized == "Freehold" {
        return Some(TenureClass::Freehold);
    }
    if tenure_normalized == "999-year Leasehold" || remaining_lease == Some(999) {
        return Some(TenureClass::Y999);
    }
    if tenure_normalized.starts_with("99") || tenure_normalized.starts_with("103") {
        return Some(TenureClass::Y99);
    }
    None
}

/// Loads one CSV file into staging. Returns `Err` only for file-level
/// failures (IO, malformed CSV structure, contract mismatch); per-row
/// problems are recorded on `run_ctx` and the row is skipped.
pub async fn load_file(
    pool: &PgPool,
    contract: &SchemaContract,
    registry: &RuleRegistry,
    run_ctx: &mut RunContext,
    path: &Path,
) -> Result<(), CoreError> {
    let file_hash = fingerprint::compute_file_sha256(path).map_err(|source| CoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    run_ctx.file_fingerprints.insert(file_name.clone(), file_hash);
    run_ctx.total_files += 1;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(CoreError::Csv)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(CoreError::Csv)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    run_ctx.header_fingerprint = fingerprint::compute_header_fingerprint(&headers);
    let resolution = contract.resolve_header(&headers)?;

    for unknown in &resolution.unknown_headers {
        tracing::warn!(header = %unknown, file = %file_name, "unrecognized CSV column, ignored");
    }

    for (row_number, record) in reader.records().enumerate() {
        run_ctx.source_row_count = Some(run_ctx.source_row_count.unwrap_or(0) + 1);

        let record = match record {
            Ok(r) => r,
            Err(err) => {
                run_ctx.rows_skipped += 1;
                run_ctx.add_semantic_warning("csv_parse", format!("row {row_number}: {err}"));
                continue;
            }
        };

        match coerce_and_classify(
            registry,
            &headers,
            &resolution.mapping,
            &record,
            run_ctx.batch_id,
            &file_name,
            row_number as i32,
        ) {
            Ok(row) => {
                insert_staging_row(pool, &row).await.map_err(|source| CoreError::Promotion {
                    stage: "staging_insert",
                    source,
                })?;
                run_ctx.rows_loaded += 1;
            }
            Err(RowOutcome::Rejected(message)) => {
                run_ctx.rows_rejected += 1;
                run_ctx.add_validation_issue("row_invariant", format!("row {row_number}: {message}"));
            }
            Err(RowOutcome::Skipped(message)) => {
                run_ctx.rows_skipped += 1;
                run_ctx.add_semantic_warning("row_unparseable", format!("row {row_number}: {message}"));
            }
        }
    }

    Ok(())
}

enum RowOutcome {
    Rejected(String),
    Skipped(String),
}

#[allow(clippy::too_many_arguments)]
fn coerce_and_classify(
    registry: &RuleRegistry,
    _headers: &[String],
    mapping: &std::collections::BTreeMap<&'static str, String>,
    record: &csv::StringRecord,
    batch_id: uuid::Uuid,
    source_file: &str,
    source_row_number: i32,
) -> Result<StagingRow, RowOutcome> {
    let get = |field: &str| -> Option<String> {
        let header = mapping.get(field)?;
        let idx = _headers.iter().position(|h| h == header)?;
        record.get(idx).map(coerce::clean_string).filter(|s| !s.is_empty())
    };

    let project_name = get("project_name").ok_or_else(|| RowOutcome::Skipped("missing project_name".into()))?;

    let raw_date = get("sale_date").ok_or_else(|| RowOutcome::Skipped("missing sale_date".into()))?;
    let transaction_date = date_parse::parse_transaction_date(&raw_date)
        .ok_or_else(|| RowOutcome::Skipped(format!("unparseable sale_date '{raw_date}'")))?;

    let price_raw = get("price").ok_or_else(|| RowOutcome::Skipped("missing price".into()))?;
    let price = coerce::parse_decimal(&price_raw)
        .ok_or_else(|| RowOutcome::Skipped(format!("unparseable price '{price_raw}'")))?;

    let area_raw = get("area_sqft").ok_or_else(|| RowOutcome::Skipped("missing area_sqft".into()))?;
    let area_sqft = coerce::parse_decimal(&area_raw)
        .ok_or_else(|| RowOutcome::Skipped(format!("unparseable area_sqft '{area_raw}'")))?;

    let district_raw = get("district").ok_or_else(|| RowOutcome::Skipped("missing district".into()))?;
    let district = district_raw.trim().to_uppercase();
    let district = if district.starts_with('D') {
        district
    } else {
        format!("D{:0>2}", district)
    };

    let sale_type_raw = get("sale_type").ok_or_else(|| RowOutcome::Skipped("missing sale_type".into()))?;
    let sale_type = crate::models::SaleType::parse(&sale_type_raw)
        .ok_or_else(|| RowOutcome::Skipped(format!("unrecognized sale_type '{sale_type_raw}'")))?;

    let floor_range = get("floor_range");
    let tenure_raw = get("tenure");

    if price <= 0.0 {
        return Err(RowOutcome::Rejected("price must be positive".into()));
    }
    if area_sqft <= 0.0 {
        return Err(RowOutcome::Rejected("area_sqft must be positive".into()));
    }
    let psf = price / area_sqft;
    if psf <= 0.0 {
        return Err(RowOutcome::Rejected("derived psf must be positive".into()));
    }

    let inputs = RuleInputs {
        area_sqft: Some(area_sqft),
        sale_type: Some(sale_type.as_str().to_string()),
        transaction_date: Some(transaction_date),
        floor_range: floor_range.clone(),
        tenure_raw: tenure_raw.clone(),
        district: Some(district.clone()),
        ..Default::default()
    };

    let region = registry
        .apply(RuleName::Region, &inputs)
        .ok()
        .and_then(|o| o.as_text().map(|s| s.to_string()))
        .unwrap_or_else(|| "OCR".to_string());

    let bedroom_count = registry
        .apply(RuleName::Bedroom, &inputs)
        .ok()
        .and_then(|o| o.as_integer())
        .unwrap_or(0)
        .clamp(0, i16::MAX as i64) as i16;

    let (tenure, lease_start_year, remaining_lease) = if tenure_raw.is_some() {
        let tenure = registry
            .apply(RuleName::Tenure, &inputs)
            .ok()
            .and_then(|o| o.as_text().map(|s| s.to_string()));
        let lease_start_year = registry
            .apply(RuleName::LeaseStartYear, &inputs)
            .ok()
            .and_then(|o| o.as_integer())
            .map(|v| v as i32);
        let remaining_lease = registry
            .apply(RuleName::RemainingLease, &inputs)
            .ok()
            .and_then(|o| o.as_integer());
        (tenure, lease_start_year, remaining_lease)
    } else {
        (None, None, None)
    };

    let tenure_class = tenure
        .as_deref()
        .and_then(|t| derive_tenure_class(t, remaining_lease));

    Ok(StagingRow {
        batch_id,
        row_hash: compute_hash(&project_name, transaction_date, price, area_sqft, &floor_range),
        project_name,
        transaction_date,
        price,
        area_sqft,
        psf,
        district,
        region,
        bedroom_count,
        sale_type: sale_type.as_str().to_string(),
        floor_range,
        tenure,
        lease_start_year,
        tenure_class,
        source_file: source_file.to_string(),
        source_row_number,
    })
}

fn compute_hash(
    project_name: &str,
    transaction_date: chrono::NaiveDate,
    price: f64,
    area_sqft: f64,
    floor_range: &Option<String>,
) -> String {
    fingerprint::compute_row_hash(&[
        HashField::Text(project_name.to_string()),
        HashField::Date(transaction_date),
        HashField::Number(price),
        HashField::AreaSqftX100(Some(area_sqft)),
        HashField::FloorRange(floor_range.clone()),
    ])
}

async fn insert_staging_row(pool: &PgPool, row: &StagingRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transactions_staging
            (batch_id, row_hash, project_name, transaction_date, price, area_sqft, psf,
             district, region, bedroom_count, sale_type, floor_range, tenure,
             lease_start_year, tenure_class, source_file, source_row_number)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(row.batch_id)
    .bind(&row.row_hash)
    .bind(&row.project_name)
    .bind(row.transaction_date)
    .bind(row.price)
    .bind(row.area_sqft)
    .bind(row.psf)
    .bind(&row.district)
    .bind(&row.region)
    .bind(row.bedroom_count)
    .bind(&row.sale_type)
    .bind(&row.floor_range)
    .bind(&row.tenure)
    .bind(row.lease_start_year)
    .bind(row.tenure_class.map(|t| t.as_str()))
    .bind(&row.source_file)
    .bind(row.source_row_number)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_tenure_class_freehold() {
        assert_eq!(derive_tenure_class("Freehold", None), Some(TenureClass::Freehold));
    }

    #[test]
    fn derive_tenure_class_999_sentinel() {
        assert_eq!(derive_tenure_class("103-year Leasehold", Some(999)), Some(TenureClass::Y999));
    }

    #[test]
    fn derive_tenure_class_99_year() {
        assert_eq!(derive_tenure_class("99-year Leasehold", Some(70)), Some(TenureClass::Y99));
    }

    #[test]
    fn derive_tenure_class_unknown_is_none() {
        assert_eq!(derive_tenure_class("leasehold", None), None);
    }
}
