//! Parses the contract middleware's `NormalizedParams` canonical dict into
//! a typed `AggregateParams`, resolving group-by/metric tokens against the
//! closed sets in `tokens` and filter values via `AggregateFilters`.

use super::contract::NormalizedParams;
use super::filters::AggregateFilters;
use super::tokens::{GroupByToken, MetricToken};
use crate::error::CoreError;
use chrono::NaiveDate;
use serde_json::{json, Value};

/// Wire-schema versions this crate knows how to serialize a response as.
/// An unknown `schema` param value is a validation error, not a silent
/// fallback to the latest -- callers pin a version deliberately.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["v1", "v2"];

#[derive(Debug, Clone)]
pub struct AggregateParams {
    pub group_by: Vec<GroupByToken>,
    pub metrics: Vec<MetricToken>,
    /// `total_units` is requested but isn't a SQL-aggregable metric -- it
    /// triggers the post-processing join against `project_inventory`
    /// instead (see `engine::apply_total_units`). Only meaningful when
    /// `group_by` includes `project` (§4.8).
    pub include_total_units: bool,
    pub filters: AggregateFilters,
    pub schema_version: String,
}

impl AggregateParams {
    pub fn from_normalized(normalized: &NormalizedParams) -> Result<Self, CoreError> {
        let group_by = parse_group_by(normalized.values.get("group_by"))?;
        let (metrics, include_total_units) = parse_metrics(normalized.values.get("metrics"))?;
        let filters = parse_filters(normalized)?;
        filters.validate()?;

        let schema_version = normalized
            .values
            .get("schema")
            .cloned()
            .unwrap_or_else(|| "v2".to_string());
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&schema_version.as_str()) {
            return Err(CoreError::QueryValidation {
                field: "schema".to_string(),
                message: format!("unknown schema version '{schema_version}'"),
            });
        }

        if include_total_units && !group_by.contains(&GroupByToken::Project) {
            return Err(CoreError::QueryValidation {
                field: "metrics".to_string(),
                message: "total_units requires group_by=project".to_string(),
            });
        }

        Ok(Self {
            group_by,
            metrics,
            include_total_units,
            filters,
            schema_version,
        })
    }

    /// Canonical, sorted-key JSON with empty/absent fields stripped --
    /// the basis of the cache key (two requests that mean the same thing
    /// must serialize identically regardless of param order or casing).
    pub fn canonical_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(
            "group_by".to_string(),
            json!(self.group_by.iter().map(|t| t.as_token()).collect::<Vec<_>>()),
        );
        let mut metrics: Vec<&str> = self.metrics.iter().map(|t| t.as_token()).collect();
        if self.include_total_units {
            metrics.push("total_units");
        }
        map.insert("metrics".to_string(), json!(metrics));
        map.insert("schema".to_string(), json!(self.schema_version));

        let f = &self.filters;
        insert_if_nonempty(&mut map, "districts", &f.districts);
        insert_if_nonempty(&mut map, "bedrooms", &f.bedrooms);
        insert_if_nonempty(&mut map, "segments", &f.segments);
        insert_if_some(&mut map, "sale_type", &f.sale_type);
        insert_if_some(&mut map, "date_from", &f.date_from.map(|d| d.to_string()));
        insert_if_some(&mut map, "date_to", &f.date_to.map(|d| d.to_string()));
        insert_if_some(&mut map, "psf_min", &f.psf_min);
        insert_if_some(&mut map, "psf_max", &f.psf_max);
        insert_if_some(&mut map, "size_min", &f.size_min);
        insert_if_some(&mut map, "size_max", &f.size_max);
        insert_if_some(&mut map, "tenure", &f.tenure);
        insert_if_some(&mut map, "project", &f.project);
        insert_if_some(&mut map, "project_exact", &f.project_exact);
        insert_if_some(&mut map, "property_age_bucket", &f.property_age_bucket);
        insert_if_some(&mut map, "limit", &f.limit);

        Value::Object(map)
    }
}

fn insert_if_some<T: serde::Serialize>(map: &mut serde_json::Map<String, Value>, key: &str, value: &Option<T>) {
    if let Some(v) = value {
        map.insert(key.to_string(), json!(v));
    }
}

fn insert_if_nonempty<T: serde::Serialize>(map: &mut serde_json::Map<String, Value>, key: &str, value: &[T]) {
    if !value.is_empty() {
        map.insert(key.to_string(), json!(value));
    }
}

fn parse_group_by(raw: Option<&String>) -> Result<Vec<GroupByToken>, CoreError> {
    let raw = raw.ok_or_else(|| CoreError::QueryValidation {
        field: "group_by".to_string(),
        message: "group_by is required".to_string(),
    })?;
    let mut tokens = Vec::new();
    for part in split_csv(raw) {
        let token = GroupByToken::from_token(&part).ok_or_else(|| CoreError::QueryValidation {
            field: "group_by".to_string(),
            message: format!("unknown group_by token '{part}'"),
        })?;
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Err(CoreError::QueryValidation {
            field: "group_by".to_string(),
            message: "group_by must name at least one token".to_string(),
        });
    }
    Ok(tokens)
}

fn parse_metrics(raw: Option<&String>) -> Result<(Vec<MetricToken>, bool), CoreError> {
    let raw = raw.ok_or_else(|| CoreError::QueryValidation {
        field: "metrics".to_string(),
        message: "metrics is required".to_string(),
    })?;
    let mut tokens = Vec::new();
    let mut include_total_units = false;
    let mut saw_any = false;
    for part in split_csv(raw) {
        saw_any = true;
        if part == "total_units" {
            include_total_units = true;
            continue;
        }
        // `count` is always present in the response (see engine::execute)
        // and isn't itself a `MetricToken` -- callers may request it
        // explicitly for symmetry with the other tokens, but it's a no-op.
        if part == "count" {
            continue;
        }
        let token = MetricToken::from_token(&part).ok_or_else(|| CoreError::QueryValidation {
            field: "metrics".to_string(),
            message: format!("unknown metric token '{part}'"),
        })?;
        tokens.push(token);
    }
    if !saw_any {
        return Err(CoreError::QueryValidation {
            field: "metrics".to_string(),
            message: "metrics must name at least one token".to_string(),
        });
    }
    Ok((tokens, include_total_units))
}

fn parse_filters(normalized: &NormalizedParams) -> Result<AggregateFilters, CoreError> {
    let v = &normalized.values;
    Ok(AggregateFilters {
        districts: split_csv_opt(v.get("districts")),
        bedrooms: parse_csv_numbers(v.get("bedrooms"), "bedrooms")?,
        segments: split_csv_opt(v.get("segments"))
            .into_iter()
            .map(|s| s.to_uppercase())
            .collect(),
        sale_type: v.get("sale_type").cloned(),
        date_from: parse_date_opt(v.get("date_from"), "date_from")?,
        date_to: parse_date_opt(v.get("date_to"), "date_to")?,
        psf_min: parse_f64_opt(v.get("psf_min"), "psf_min")?,
        psf_max: parse_f64_opt(v.get("psf_max"), "psf_max")?,
        size_min: parse_f64_opt(v.get("size_min"), "size_min")?,
        size_max: parse_f64_opt(v.get("size_max"), "size_max")?,
        tenure: v.get("tenure").cloned(),
        project: v.get("project").cloned(),
        project_exact: v.get("project_exact").cloned(),
        property_age_bucket: v.get("property_age_bucket").cloned(),
        limit: parse_i64_opt(v.get("limit"), "limit")?,
    })
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_csv_opt(raw: Option<&String>) -> Vec<String> {
    raw.map(|s| split_csv(s)).unwrap_or_default()
}

fn parse_csv_numbers(raw: Option<&String>, field: &str) -> Result<Vec<i16>, CoreError> {
    split_csv_opt(raw)
        .into_iter()
        .map(|s| {
            s.parse::<i16>().map_err(|_| CoreError::QueryValidation {
                field: field.to_string(),
                message: format!("'{s}' is not a valid integer"),
            })
        })
        .collect()
}

fn parse_date_opt(raw: Option<&String>, field: &str) -> Result<Option<NaiveDate>, CoreError> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| CoreError::QueryValidation {
                field: field.to_string(),
                message: format!("'{s}' is not a valid YYYY-MM-DD date"),
            }),
    }
}

fn parse_f64_opt(raw: Option<&String>, field: &str) -> Result<Option<f64>, CoreError> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<f64>().map(Some).map_err(|_| CoreError::QueryValidation {
            field: field.to_string(),
            message: format!("'{s}' is not a valid number"),
        }),
    }
}

fn parse_i64_opt(raw: Option<&String>, field: &str) -> Result<Option<i64>, CoreError> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(|_| CoreError::QueryValidation {
            field: field.to_string(),
            message: format!("'{s}' is not a valid integer"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn normalized(pairs: &[(&str, &str)]) -> NormalizedParams {
        NormalizedParams {
            values: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>(),
            violations: Vec::new(),
        }
    }

    #[test]
    fn parses_group_by_and_metrics() {
        let params = AggregateParams::from_normalized(&normalized(&[
            ("group_by", "region"),
            ("metrics", "count,avg_psf"),
        ]))
        .unwrap();
        assert_eq!(params.group_by, vec![GroupByToken::Region]);
        assert_eq!(params.metrics.len(), 1); // count is implicit, not a MetricToken
    }

    #[test]
    fn unknown_group_by_token_is_query_validation_error() {
        let result = AggregateParams::from_normalized(&normalized(&[
            ("group_by", "not_a_token"),
            ("metrics", "count"),
        ]));
        assert!(matches!(result, Err(CoreError::QueryValidation { .. })));
    }

    #[test]
    fn total_units_without_project_group_by_is_rejected() {
        let result = AggregateParams::from_normalized(&normalized(&[
            ("group_by", "region"),
            ("metrics", "total_units"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn total_units_with_project_group_by_is_accepted() {
        let params = AggregateParams::from_normalized(&normalized(&[
            ("group_by", "project"),
            ("metrics", "total_units"),
        ]))
        .unwrap();
        assert!(params.include_total_units);
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let result = AggregateParams::from_normalized(&normalized(&[
            ("group_by", "region"),
            ("metrics", "count"),
            ("schema", "v99"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn canonical_json_omits_unset_filters() {
        let params = AggregateParams::from_normalized(&normalized(&[
            ("group_by", "region"),
            ("metrics", "count"),
        ]))
        .unwrap();
        let canonical = params.canonical_json();
        assert!(canonical.get("districts").is_none());
        assert!(canonical.get("group_by").is_some());
    }
}
