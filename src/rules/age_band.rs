//! Property-age bucket classifier.
//!
//! Shared by the Rule Registry (as `property_age_bucket`, usable as a
//! loader-time-derived column) and the aggregation engine's `age_band`
//! group-by token (compiled into a `CASE` expression over the same
//! thresholds -- see `aggregate::tokens::age_band_case_sql`). The bucket
//! strings live here exactly once; neither consumer hardcodes a literal.

use super::RuleInputs;
use crate::error::CoreError;
use chrono::Datelike;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBand {
    NewLaunch,
    Years0To5,
    Years6To10,
    Years11To20,
    Years21Plus,
}

impl AgeBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBand::NewLaunch => "New Launch",
            AgeBand::Years0To5 => "0-5 years",
            AgeBand::Years6To10 => "6-10 years",
            AgeBand::Years11To20 => "11-20 years",
            AgeBand::Years21Plus => "21+ years",
        }
    }

    /// Upper bound (inclusive) of `transaction_year - lease_start_year` for
    /// this bucket, in ascending order. `None` means unbounded (last tier).
    pub fn age_upper_bound(&self) -> Option<i32> {
        match self {
            AgeBand::NewLaunch => Some(0),
            AgeBand::Years0To5 => Some(5),
            AgeBand::Years6To10 => Some(10),
            AgeBand::Years11To20 => Some(20),
            AgeBand::Years21Plus => None,
        }
    }
}

/// Ascending order, matching the `CASE WHEN` chain the aggregation engine
/// compiles this into.
pub const AGE_BAND_ORDER: &[AgeBand] = &[
    AgeBand::NewLaunch,
    AgeBand::Years0To5,
    AgeBand::Years6To10,
    AgeBand::Years11To20,
    AgeBand::Years21Plus,
];

pub fn classify(inputs: &RuleInputs) -> Result<AgeBand, CoreError> {
    if inputs.sale_type.as_deref() == Some("New Sale") {
        return Ok(AgeBand::NewLaunch);
    }

    let lease_start = inputs.lease_start_year.ok_or_else(|| CoreError::Classifier {
        rule: "property_age_bucket".to_string(),
        message: "lease_start_year is required for resale age banding".to_string(),
    })?;
    let transaction_year = inputs
        .transaction_date
        .map(|d| d.year())
        .ok_or_else(|| CoreError::Classifier {
            rule: "property_age_bucket".to_string(),
            message: "transaction_date is required for resale age banding".to_string(),
        })?;

    let age = (transaction_year - lease_start).max(0);
    for band in AGE_BAND_ORDER {
        if let Some(upper) = band.age_upper_bound() {
            if age <= upper {
                return Ok(*band);
            }
        }
    }
    Ok(AgeBand::Years21Plus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn new_sale_is_always_new_launch() {
        let inputs = RuleInputs {
            sale_type: Some("New Sale".to_string()),
            ..Default::default()
        };
        assert_eq!(classify(&inputs).unwrap(), AgeBand::NewLaunch);
    }

    #[test]
    fn resale_buckets_by_age() {
        let inputs = RuleInputs {
            sale_type: Some("Resale".to_string()),
            lease_start_year: Some(2000),
            transaction_date: NaiveDate::from_ymd_opt(2023, 1, 1),
            ..Default::default()
        };
        assert_eq!(classify(&inputs).unwrap(), AgeBand::Years21Plus);
    }

    #[test]
    fn resale_missing_lease_start_year_is_classifier_error() {
        let inputs = RuleInputs {
            sale_type: Some("Resale".to_string()),
            ..Default::default()
        };
        assert!(classify(&inputs).is_err());
    }
}
