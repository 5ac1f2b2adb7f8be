//! The closed group-by/metric token sets. Every token maps to a
//! precompiled SQL fragment; user input selects *which* token, never
//! contributes SQL text itself.

use crate::rules::AGE_BAND_ORDER;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupByToken {
    District,
    Bedroom,
    SaleType,
    Project,
    Year,
    Month,
    Quarter,
    Region,
    FloorLevel,
    AgeBand,
}

impl GroupByToken {
    pub fn from_token(s: &str) -> Option<Self> {
        Some(match s {
            "district" => Self::District,
            "bedroom" => Self::Bedroom,
            "sale_type" => Self::SaleType,
            "project" => Self::Project,
            "year" => Self::Year,
            "month" => Self::Month,
            "quarter" => Self::Quarter,
            "region" => Self::Region,
            "floor_level" => Self::FloorLevel,
            "age_band" => Self::AgeBand,
            _ => return None,
        })
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Self::District => "district",
            Self::Bedroom => "bedroom",
            Self::SaleType => "sale_type",
            Self::Project => "project",
            Self::Year => "year",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Region => "region",
            Self::FloorLevel => "floor_level",
            Self::AgeBand => "age_band",
        }
    }

    /// `(select_expr AS alias, group_by_exprs)`. `month`/`quarter` yield two
    /// grouping columns (year plus month/quarter); every other token yields
    /// exactly one.
    pub fn sql_columns(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            Self::District => vec![("district", "district")],
            Self::Bedroom => vec![("bedroom_count", "bedroom_count")],
            Self::SaleType => vec![("sale_type", "sale_type")],
            Self::Project => vec![("project_name", "project_name")],
            Self::Year => vec![("EXTRACT(YEAR FROM transaction_date)::int", "_year")],
            Self::Month => vec![
                ("EXTRACT(YEAR FROM transaction_date)::int", "_year"),
                ("EXTRACT(MONTH FROM transaction_date)::int", "_month"),
            ],
            Self::Quarter => vec![
                ("EXTRACT(YEAR FROM transaction_date)::int", "_year"),
                ("EXTRACT(QUARTER FROM transaction_date)::int", "_quarter"),
            ],
            Self::Region => vec![("region", "region")],
            Self::FloorLevel => vec![(FLOOR_LEVEL_CASE_SQL, "floor_level")],
            Self::AgeBand => vec![(age_band_case_sql(), "age_band")],
        }
    }
}

impl fmt::Display for GroupByToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Compiled once (it's a `const`, not derived per-query): buckets
/// `floor_range` into the same Low/Mid/High/Penthouse/Basement tiers as
/// `rules::floor_level::classify`, expressed in SQL since the column isn't
/// materialized.
const FLOOR_LEVEL_CASE_SQL: &str = "CASE \
    WHEN floor_range IS NULL THEN 'Unknown' \
    WHEN floor_range ILIKE 'B%' THEN 'Basement' \
    WHEN (regexp_match(floor_range, '^(\\d+)'))[1]::int <= 5 THEN 'Low' \
    WHEN (regexp_match(floor_range, '^(\\d+)'))[1]::int <= 15 THEN 'Mid' \
    WHEN (regexp_match(floor_range, '^(\\d+)'))[1]::int <= 30 THEN 'High' \
    ELSE 'Penthouse' END";

/// CCR/RCR/OCR ordering for `ORDER BY` when grouping by region -- core to
/// fringe, not alphabetical (`CCR, OCR, RCR`).
pub const REGION_ORDER_CASE_SQL: &str =
    "CASE region WHEN 'CCR' THEN 0 WHEN 'RCR' THEN 1 WHEN 'OCR' THEN 2 ELSE 3 END";

/// Compiled once from `rules::AGE_BAND_ORDER` rather than hand-duplicated
/// here, so the boundary years never drift from the Rule Registry's own
/// classifier.
pub fn age_band_case_sql() -> &'static str {
    use std::sync::OnceLock;
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let mut sql = String::from("CASE WHEN sale_type = 'New Sale' THEN 'New Launch' \
            WHEN lease_start_year IS NULL THEN 'Unknown' ELSE CASE ");
        for band in AGE_BAND_ORDER {
            if let Some(upper) = band.age_upper_bound() {
                sql.push_str(&format!(
                    "WHEN (EXTRACT(YEAR FROM transaction_date)::int - lease_start_year) <= {} THEN '{}' ",
                    upper,
                    band.as_str()
                ));
            }
        }
        sql.push_str(&format!("ELSE '{}' END END", AGE_BAND_ORDER.last().unwrap().as_str()));
        sql
    })
    .as_str()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricToken {
    AvgPsf,
    MedianPsf,
    TotalValue,
    AvgPrice,
    MedianPrice,
    MinPsf,
    MaxPsf,
    MinPrice,
    MaxPrice,
    AvgSize,
    TotalSqft,
    Price25th,
    Price75th,
    Psf25th,
    Psf75th,
    MedianPsfActual,
}

impl MetricToken {
    pub fn from_token(s: &str) -> Option<Self> {
        Some(match s {
            "avg_psf" => Self::AvgPsf,
            "median_psf" => Self::MedianPsf,
            "total_value" => Self::TotalValue,
            "avg_price" => Self::AvgPrice,
            "median_price" => Self::MedianPrice,
            "min_psf" => Self::MinPsf,
            "max_psf" => Self::MaxPsf,
            "min_price" => Self::MinPrice,
            "max_price" => Self::MaxPrice,
            "avg_size" => Self::AvgSize,
            "total_sqft" => Self::TotalSqft,
            "price_25th" => Self::Price25th,
            "price_75th" => Self::Price75th,
            "psf_25th" => Self::Psf25th,
            "psf_75th" => Self::Psf75th,
            "median_psf_actual" => Self::MedianPsfActual,
            _ => return None,
        })
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Self::AvgPsf => "avg_psf",
            Self::MedianPsf => "median_psf",
            Self::TotalValue => "total_value",
            Self::AvgPrice => "avg_price",
            Self::MedianPrice => "median_price",
            Self::MinPsf => "min_psf",
            Self::MaxPsf => "max_psf",
            Self::MinPrice => "min_price",
            Self::MaxPrice => "max_price",
            Self::AvgSize => "avg_size",
            Self::TotalSqft => "total_sqft",
            Self::Price25th => "price_25th",
            Self::Price75th => "price_75th",
            Self::Psf25th => "psf_25th",
            Self::Psf75th => "psf_75th",
            Self::MedianPsfActual => "median_psf_actual",
        }
    }

    /// The `SELECT`-list expression, aliased to the metric's own token.
    pub fn sql_expr(&self) -> String {
        let expr = match self {
            Self::AvgPsf => "AVG(psf)",
            // Kept distinct from `median_psf_actual` even though both compute
            // the same thing: the original extract carried two call sites
            // (a cached approximate figure vs. an on-demand exact one) that
            // collapsed onto the same PERCENTILE_CONT once ported here.
            Self::MedianPsf | Self::MedianPsfActual => "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY psf)",
            Self::TotalValue => "SUM(price)",
            Self::AvgPrice => "AVG(price)",
            Self::MedianPrice => "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY price)",
            Self::MinPsf => "MIN(psf)",
            Self::MaxPsf => "MAX(psf)",
            Self::MinPrice => "MIN(price)",
            Self::MaxPrice => "MAX(price)",
            Self::AvgSize => "AVG(area_sqft)",
            Self::TotalSqft => "SUM(area_sqft)",
            Self::Price25th => "PERCENTILE_CONT(0.25) WITHIN GROUP (ORDER BY price)",
            Self::Price75th => "PERCENTILE_CONT(0.75) WITHIN GROUP (ORDER BY price)",
            Self::Psf25th => "PERCENTILE_CONT(0.25) WITHIN GROUP (ORDER BY psf)",
            Self::Psf75th => "PERCENTILE_CONT(0.75) WITHIN GROUP (ORDER BY psf)",
        };
        format!("{expr} AS {}", self.as_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_group_by_token_is_none() {
        assert!(GroupByToken::from_token("not_a_real_token").is_none());
    }

    #[test]
    fn month_yields_two_group_columns() {
        assert_eq!(GroupByToken::Month.sql_columns().len(), 2);
    }

    #[test]
    fn district_yields_one_group_column() {
        assert_eq!(GroupByToken::District.sql_columns().len(), 1);
    }

    #[test]
    fn age_band_case_sql_contains_every_bucket_label() {
        let sql = age_band_case_sql();
        for band in AGE_BAND_ORDER {
            assert!(sql.contains(band.as_str()), "missing {}", band.as_str());
        }
    }

    #[test]
    fn region_order_case_sql_ranks_core_before_fringe() {
        let sql = REGION_ORDER_CASE_SQL;
        let pos = |needle: &str| sql.find(needle).unwrap();
        assert!(pos("WHEN 'CCR'") < pos("WHEN 'RCR'"));
        assert!(pos("WHEN 'RCR'") < pos("WHEN 'OCR'"));
    }

    #[test]
    fn unknown_metric_token_is_none() {
        assert!(MetricToken::from_token("not_a_real_metric").is_none());
    }

    #[test]
    fn every_metric_expr_is_aliased_to_its_own_token() {
        for token in [
            MetricToken::AvgPsf,
            MetricToken::MedianPsf,
            MetricToken::TotalValue,
            MetricToken::MedianPsfActual,
        ] {
            assert!(token.sql_expr().ends_with(&format!("AS {}", token.as_token())));
        }
    }
}
