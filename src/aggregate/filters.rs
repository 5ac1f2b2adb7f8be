//! Filter parameters for `aggregate()`. Every filter maps to one
//! parameterized predicate appended to a `QueryBuilder` -- never string
//! interpolation of a value into SQL text.

use crate::error::CoreError;
use crate::rules::{AgeBand, AGE_BAND_ORDER, REGION_BY_DISTRICT};
use chrono::NaiveDate;
use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, Default)]
pub struct AggregateFilters {
    pub districts: Vec<String>,
    pub bedrooms: Vec<i16>,
    pub segments: Vec<String>,
    pub sale_type: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub psf_min: Option<f64>,
    pub psf_max: Option<f64>,
    pub size_min: Option<f64>,
    pub size_max: Option<f64>,
    /// Normalized to one of `"freehold" | "99-year" | "999-year"`.
    pub tenure: Option<String>,
    pub project: Option<String>,
    pub project_exact: Option<String>,
    pub property_age_bucket: Option<String>,
    pub limit: Option<i64>,
}

impl AggregateFilters {
    /// Validates closed-set fields and numeric ranges before any SQL is
    /// built. Every failure maps to `CoreError::QueryValidation` naming the
    /// offending field.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(limit) = self.limit {
            if limit <= 0 || limit > 10_000 {
                return Err(CoreError::QueryValidation {
                    field: "limit".to_string(),
                    message: format!("limit must be in (0, 10000], got {limit}"),
                });
            }
        }
        for segment in &self.segments {
            if !["CCR", "RCR", "OCR"].contains(&segment.as_str()) {
                return Err(CoreError::QueryValidation {
                    field: "segments".to_string(),
                    message: format!("unknown market segment '{segment}'"),
                });
            }
        }
        if let Some(tenure) = &self.tenure {
            if !["freehold", "99-year", "999-year"].contains(&tenure.as_str()) {
                return Err(CoreError::QueryValidation {
                    field: "tenure".to_string(),
                    message: format!("tenure must be one of freehold/99-year/999-year, got '{tenure}'"),
                });
            }
        }
        if let Some(bucket) = &self.property_age_bucket {
            if !AGE_BAND_ORDER.iter().any(|b| b.as_str() == bucket) {
                return Err(CoreError::QueryValidation {
                    field: "property_age_bucket".to_string(),
                    message: format!("unknown property_age_bucket '{bucket}'"),
                });
            }
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(CoreError::QueryValidation {
                    field: "date_from".to_string(),
                    message: "date_from must not be after date_to".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Appends `AND <predicate>` clauses for every populated filter. Always
    /// called after the base `is_outlier = false` predicate is already in
    /// the builder.
    pub fn push_predicates<'a>(&'a self, qb: &mut QueryBuilder<'a, Postgres>) {
        if !self.districts.is_empty() {
            qb.push(" AND district = ANY(");
            qb.push_bind(self.districts.clone());
            qb.push(")");
        }

        let expanded_districts = self.expand_segments();
        if !expanded_districts.is_empty() {
            qb.push(" AND district = ANY(");
            qb.push_bind(expanded_districts);
            qb.push(")");
        }

        if !self.bedrooms.is_empty() {
            qb.push(" AND bedroom_count = ANY(");
            qb.push_bind(self.bedrooms.clone());
            qb.push(")");
        }

        if let Some(sale_type) = &self.sale_type {
            qb.push(" AND sale_type = ");
            qb.push_bind(sale_type.clone());
        }

        if let Some(from) = self.date_from {
            qb.push(" AND transaction_date >= ");
            qb.push_bind(from);
        }
        if let Some(to) = self.date_to {
            qb.push(" AND transaction_date < ");
            qb.push_bind(to);
        }

        if let Some(min) = self.psf_min {
            qb.push(" AND psf >= ");
            qb.push_bind(min);
        }
        if let Some(max) = self.psf_max {
            qb.push(" AND psf <= ");
            qb.push_bind(max);
        }
        if let Some(min) = self.size_min {
            qb.push(" AND area_sqft >= ");
            qb.push_bind(min);
        }
        if let Some(max) = self.size_max {
            qb.push(" AND area_sqft <= ");
            qb.push_bind(max);
        }

        if let Some(tenure) = &self.tenure {
            let class = match tenure.as_str() {
                "freehold" => "freehold",
                "99-year" => "99",
                "999-year" => "999",
                other => other,
            };
            qb.push(" AND tenure_class = ");
            qb.push_bind(class.to_string());
        }

        if let Some(project) = &self.project {
            qb.push(" AND project_name ILIKE ");
            qb.push_bind(format!("%{project}%"));
        }
        if let Some(project_exact) = &self.project_exact {
            qb.push(" AND project_name = ");
            qb.push_bind(project_exact.clone());
        }

        if let Some(bucket) = &self.property_age_bucket {
            qb.push(" AND ");
            qb.push(super::tokens::age_band_case_sql());
            qb.push(" = ");
            qb.push_bind(bucket.clone());
        }
    }

    /// Names of every filter field that's actually populated, for the
    /// response meta's `filters_applied` -- lets a caller see exactly which
    /// of its params were acted on without re-deriving that from the
    /// request it sent.
    pub fn active_filter_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if !self.districts.is_empty() {
            names.push("districts".to_string());
        }
        if !self.bedrooms.is_empty() {
            names.push("bedrooms".to_string());
        }
        if !self.segments.is_empty() {
            names.push("segments".to_string());
        }
        if self.sale_type.is_some() {
            names.push("sale_type".to_string());
        }
        if self.date_from.is_some() {
            names.push("date_from".to_string());
        }
        if self.date_to.is_some() {
            names.push("date_to".to_string());
        }
        if self.psf_min.is_some() {
            names.push("psf_min".to_string());
        }
        if self.psf_max.is_some() {
            names.push("psf_max".to_string());
        }
        if self.size_min.is_some() {
            names.push("size_min".to_string());
        }
        if self.size_max.is_some() {
            names.push("size_max".to_string());
        }
        if self.tenure.is_some() {
            names.push("tenure".to_string());
        }
        if self.project.is_some() {
            names.push("project".to_string());
        }
        if self.project_exact.is_some() {
            names.push("project_exact".to_string());
        }
        if self.property_age_bucket.is_some() {
            names.push("property_age_bucket".to_string());
        }
        names
    }

    /// Expands `segments[]` into the district set via the static
    /// district->region table, compiled once at process start (the table
    /// itself is a `const`; this just filters it per call).
    fn expand_segments(&self) -> Vec<String> {
        if self.segments.is_empty() {
            return Vec::new();
        }
        REGION_BY_DISTRICT
            .iter()
            .filter(|(_, region)| self.segments.iter().any(|s| s == region))
            .map(|(district, _)| district.to_string())
            .collect()
    }
}

/// Returns every valid `property_age_bucket` value, for API discovery.
pub fn known_age_buckets() -> Vec<&'static str> {
    AGE_BAND_ORDER.iter().map(AgeBand::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_limit() {
        let filters = AggregateFilters {
            limit: Some(20_000),
            ..Default::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn rejects_unknown_segment() {
        let filters = AggregateFilters {
            segments: vec!["MCR".to_string()],
            ..Default::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn rejects_date_from_after_date_to() {
        let filters = AggregateFilters {
            date_from: NaiveDate::from_ymd_opt(2024, 6, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn accepts_known_tenure_and_age_bucket() {
        let filters = AggregateFilters {
            tenure: Some("99-year".to_string()),
            property_age_bucket: Some("0-5 years".to_string()),
            ..Default::default()
        };
        assert!(filters.validate().is_ok());
    }
}
