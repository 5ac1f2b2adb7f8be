//! Executes aggregation requests: contract-normalize params, check the
//! cache, compose and run the SQL on a miss, shape the response, cache it.

use super::contract::EndpointContract;
use super::inventory;
use super::params::AggregateParams;
use super::tokens::{GroupByToken, MetricToken};
use crate::error::CoreError;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder, Row};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMeta {
    pub total_records: i64,
    pub group_by: Vec<String>,
    pub metrics: Vec<String>,
    pub filters_applied: Vec<String>,
    pub elapsed_ms: u64,
    pub cache_hit: bool,
    pub schema_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub data: Vec<Value>,
    pub meta: AggregateMeta,
}

/// `group_by` + `metrics` + every populated filter, serving cached results
/// when available. The SQL itself never carries a byte of user input --
/// every clause is either a precompiled token expression or a bound param.
pub async fn aggregate(
    state: &AppState,
    raw_params: &BTreeMap<String, String>,
) -> Result<AggregateResponse, CoreError> {
    run(state, &EndpointContract::AGGREGATE, raw_params).await
}

/// Same machinery as `aggregate`, scoped to the `dashboard` endpoint
/// contract. The panel list itself is resolved by the caller today
/// (dashboards are a fixed set of pre-canned `aggregate` calls); this
/// entry point exists so the two endpoints can diverge in contract shape
/// without duplicating the execution path.
pub async fn dashboard(
    state: &AppState,
    raw_params: &BTreeMap<String, String>,
) -> Result<AggregateResponse, CoreError> {
    run(state, &EndpointContract::DASHBOARD, raw_params).await
}

async fn run(
    state: &AppState,
    contract: &EndpointContract,
    raw_params: &BTreeMap<String, String>,
) -> Result<AggregateResponse, CoreError> {
    let started = Instant::now();

    let normalized = contract.normalize(raw_params)?;
    let params = AggregateParams::from_normalized(&normalized)?;

    let canonical = params.canonical_json();
    let cache_key = super::cache::AggregateCache::build_key(contract.endpoint, &canonical);

    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(response_from_cached(cached, started.elapsed().as_millis() as u64));
    }

    let mut response = execute(state, &params).await?;
    response.meta.elapsed_ms = started.elapsed().as_millis() as u64;
    state.cache.put(cache_key, serde_json::to_value(&response).expect("AggregateResponse always serializes"));

    Ok(response)
}

fn response_from_cached(mut cached: Value, elapsed_ms: u64) -> AggregateResponse {
    if let Some(meta) = cached.get_mut("meta").and_then(Value::as_object_mut) {
        meta.insert("cache_hit".to_string(), Value::Bool(true));
        meta.insert("elapsed_ms".to_string(), Value::from(elapsed_ms));
    }
    serde_json::from_value(cached).expect("cached payload was produced by this module's own serialization")
}

async fn execute(state: &AppState, params: &AggregateParams) -> Result<AggregateResponse, CoreError> {
    let total_records = count_matching(state, params).await?;

    if total_records == 0 {
        return Ok(AggregateResponse {
            data: Vec::new(),
            meta: build_meta(params, 0, 0, false),
        });
    }

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");

    let mut select_cols: Vec<&'static str> = Vec::new();
    let mut group_exprs: Vec<&'static str> = Vec::new();
    for token in &params.group_by {
        for (expr, alias) in token.sql_columns() {
            select_cols.push(alias);
            group_exprs.push(expr);
            qb.push(format!("{expr} AS {alias}, "));
        }
    }

    qb.push("COUNT(*) AS count");
    for metric in &params.metrics {
        qb.push(", ");
        qb.push(metric.sql_expr());
    }

    qb.push(" FROM transactions WHERE is_outlier = FALSE");
    params.filters.push_predicates(&mut qb);

    qb.push(" GROUP BY ");
    for (i, expr) in group_exprs.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(expr.to_string());
    }

    if params.group_by.contains(&GroupByToken::Project) {
        qb.push(" ORDER BY count DESC");
    } else if params.group_by.contains(&GroupByToken::Region) {
        qb.push(format!(" ORDER BY {} ASC", super::tokens::REGION_ORDER_CASE_SQL));
    } else if let Some(first_alias) = select_cols.first() {
        qb.push(format!(" ORDER BY {first_alias} ASC"));
    }

    if let Some(limit) = params.filters.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
    }

    let query_fingerprint = fingerprint_query(params);
    let timeout = Duration::from_millis(state.config.query_timeout_ms);
    let rows = tokio::time::timeout(timeout, qb.build().fetch_all(&state.pool))
        .await
        .map_err(|_| CoreError::Timeout {
            elapsed_ms: state.config.query_timeout_ms,
        })?
        .map_err(|source| CoreError::QueryExecution {
            query_fingerprint: query_fingerprint.clone(),
            source,
        })?;

    let mut data: Vec<Value> = rows.iter().map(|row| row_to_json(row, &select_cols, params)).collect();

    if params.include_total_units && params.group_by.contains(&GroupByToken::Project) {
        apply_total_units(state, &mut data).await?;
    }

    Ok(AggregateResponse {
        data,
        meta: build_meta(params, total_records, 0, false),
    })
}

async fn count_matching(state: &AppState, params: &AggregateParams) -> Result<i64, CoreError> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM transactions WHERE is_outlier = FALSE");
    params.filters.push_predicates(&mut qb);

    let fingerprint = fingerprint_query(params);
    let timeout = Duration::from_millis(state.config.query_timeout_ms);
    let row = tokio::time::timeout(timeout, qb.build().fetch_one(&state.pool))
        .await
        .map_err(|_| CoreError::Timeout {
            elapsed_ms: state.config.query_timeout_ms,
        })?
        .map_err(|source| CoreError::QueryExecution {
            query_fingerprint: fingerprint,
            source,
        })?;
    Ok(row.try_get::<i64, _>(0).unwrap_or(0))
}

/// Turns one result row into a JSON object, folding the `_year`/`_month`/
/// `_quarter` internal grouping columns into a single `YYYY-MM`/`YYYY-Q?`
/// string and rounding float metrics to 2 decimal places.
fn row_to_json(row: &sqlx::postgres::PgRow, select_cols: &[&'static str], params: &AggregateParams) -> Value {
    let mut obj = Map::new();
    let mut year: Option<i32> = None;
    let mut month: Option<i32> = None;
    let mut quarter: Option<i32> = None;

    for col in select_cols {
        match *col {
            "_year" => year = row.try_get::<i32, _>("_year").ok(),
            "_month" => month = row.try_get::<i32, _>("_month").ok(),
            "_quarter" => quarter = row.try_get::<i32, _>("_quarter").ok(),
            "bedroom_count" => {
                obj.insert("bedroom".to_string(), Value::from(row.try_get::<i16, _>(*col).unwrap_or_default()));
            }
            other => {
                if let Ok(v) = row.try_get::<String, _>(other) {
                    obj.insert(other.to_string(), Value::from(v));
                }
            }
        }
    }

    if params.group_by.contains(&GroupByToken::Year) {
        if let Some(y) = year {
            obj.insert("year".to_string(), Value::from(y));
        }
    }
    if params.group_by.contains(&GroupByToken::Month) {
        if let (Some(y), Some(m)) = (year, month) {
            obj.insert("month".to_string(), Value::from(format!("{y:04}-{m:02}")));
        }
    }
    if params.group_by.contains(&GroupByToken::Quarter) {
        if let (Some(y), Some(q)) = (year, quarter) {
            obj.insert("quarter".to_string(), Value::from(format!("{y:04}-Q{q}")));
        }
    }

    obj.insert("count".to_string(), Value::from(row.try_get::<i64, _>("count").unwrap_or_default()));
    for metric in &params.metrics {
        let token = metric.as_token();
        let rounded = row
            .try_get::<f64, _>(token)
            .ok()
            .map(|v| (v * 100.0).round() / 100.0);
        obj.insert(token.to_string(), rounded.map(Value::from).unwrap_or(Value::Null));
    }

    Value::Object(obj)
}

async fn apply_total_units(state: &AppState, data: &mut [Value]) -> Result<(), CoreError> {
    let totals = inventory::load_total_units(&state.pool)
        .await
        .map_err(|source| CoreError::QueryExecution {
            query_fingerprint: "project_inventory_lookup".to_string(),
            source,
        })?;

    for row in data.iter_mut() {
        let Some(obj) = row.as_object_mut() else { continue };
        let project = obj.get("project_name").and_then(Value::as_str).map(str::to_string);
        let sold = obj.get("count").and_then(Value::as_i64).unwrap_or(0);
        let total_units = project.and_then(|p| totals.get(&p).copied());

        obj.insert(
            "total_units".to_string(),
            total_units.map(Value::from).unwrap_or(Value::Null),
        );
        obj.insert(
            "percent_sold".to_string(),
            inventory::percent_sold(sold, total_units).map(Value::from).unwrap_or(Value::Null),
        );
        obj.insert(
            "unsold_inventory".to_string(),
            inventory::unsold_inventory(sold, total_units).map(Value::from).unwrap_or(Value::Null),
        );
    }
    Ok(())
}

fn build_meta(params: &AggregateParams, total_records: i64, elapsed_ms: u64, cache_hit: bool) -> AggregateMeta {
    let mut metrics: Vec<String> = params.metrics.iter().map(|m| m.as_token().to_string()).collect();
    if params.include_total_units {
        metrics.push("total_units".to_string());
    }
    AggregateMeta {
        total_records,
        group_by: params.group_by.iter().map(|g| g.as_token().to_string()).collect(),
        metrics,
        filters_applied: params.filters.active_filter_names(),
        elapsed_ms,
        cache_hit,
        schema_version: params.schema_version.clone(),
    }
}

/// Short, stable token identifying this query's shape for error logs --
/// never the row-level driver error, since the SQL itself is static and
/// allow-listed (see `CoreError::QueryExecution`).
fn fingerprint_query(params: &AggregateParams) -> String {
    let group_by: Vec<&str> = params.group_by.iter().map(GroupByToken::as_token).collect();
    let metrics: Vec<&str> = params.metrics.iter().map(MetricToken::as_token).collect();
    format!("group_by={};metrics={}", group_by.join(","), metrics.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_same_params() {
        let normalized = super::super::contract::NormalizedParams {
            values: [("group_by".to_string(), "region".to_string()), ("metrics".to_string(), "count".to_string())]
                .into_iter()
                .collect(),
            violations: Vec::new(),
        };
        let params = AggregateParams::from_normalized(&normalized).unwrap();
        assert_eq!(fingerprint_query(&params), fingerprint_query(&params));
    }
}
