//! Tenure normalization and lease-arithmetic classifiers.
//!
//! URA extracts spell tenure inconsistently ("Freehold", "99 yrs lease
//! commencing from 2012", "999-year leasehold", "FH"). These rules collapse
//! that into one normalized string plus the numeric fields
//! (`lease_start_year`, `remaining_lease`) the aggregation engine's tenure
//! filter depends on. The canonical `tenure_class` bucket used everywhere
//! downstream is derived from these two rules at load time -- see
//! `loader::derive_tenure_class`.

use super::RuleInputs;
use crate::error::CoreError;

pub fn classify(inputs: &RuleInputs) -> Result<String, CoreError> {
    let raw = inputs.tenure_raw.as_deref().ok_or_else(|| CoreError::Classifier {
        rule: "tenure".to_string(),
        message: "tenure_raw is required".to_string(),
    })?;

    let lower = raw.trim().to_lowercase();
    if lower.is_empty() {
        return Err(CoreError::Classifier {
            rule: "tenure".to_string(),
            message: "empty tenure string".to_string(),
        });
    }

    if lower.contains("freehold") || lower == "fh" {
        return Ok("Freehold".to_string());
    }
    if lower.contains("999") {
        return Ok("999-year Leasehold".to_string());
    }
    if lower.contains("99") {
        return Ok("99-year Leasehold".to_string());
    }
    if lower.contains("103") {
        return Ok("103-year Leasehold".to_string());
    }
    // Any other "<N> yrs"-shaped string: surface the raw duration, still
    // not freehold/999/99.
    Ok(raw.trim().to_string())
}

/// Extracts a commencement year from strings like
/// "99 yrs lease commencing from 2012" by scanning for the first
/// 4-digit run that plausibly represents a calendar year.
pub fn lease_start_year(inputs: &RuleInputs) -> Result<i64, CoreError> {
    if let Some(year) = inputs.lease_start_year {
        return Ok(year as i64);
    }
    let raw = inputs.tenure_raw.as_deref().ok_or_else(|| CoreError::Classifier {
        rule: "lease_start_year".to_string(),
        message: "tenure_raw is required".to_string(),
    })?;

    find_four_digit_year(raw).ok_or_else(|| CoreError::Classifier {
        rule: "lease_start_year".to_string(),
        message: format!("no commencement year found in '{raw}'"),
    })
}

/// Remaining lease in years as of `as_of_year`. Freehold and 999-year
/// tenures use the `999` sentinel (matching the source's convention),
/// resolved consistently everywhere via `tenure_class` rather than
/// re-deriving this per call site.
pub fn remaining_lease(inputs: &RuleInputs) -> Result<i64, CoreError> {
    if let Some(explicit) = inputs.remaining_lease {
        return Ok(explicit as i64);
    }

    let tenure = classify(inputs)?;
    if tenure == "Freehold" || tenure == "999-year Leasehold" {
        return Ok(999);
    }

    let duration_years: i64 = if tenure.starts_with("103") {
        103
    } else if tenure.starts_with("99") {
        99
    } else {
        return Err(CoreError::Classifier {
            rule: "remaining_lease".to_string(),
            message: format!("cannot derive lease duration from '{tenure}'"),
        });
    };

    let start_year = lease_start_year(inputs)?;
    let as_of_year = inputs
        .transaction_date
        .map(|d| d.format("%Y").to_string().parse::<i64>().unwrap_or(start_year))
        .unwrap_or(start_year);

    Ok((start_year + duration_years - as_of_year).max(0))
}

fn find_four_digit_year(s: &str) -> Option<i64> {
    let bytes: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i + 4 <= bytes.len() {
        let window: String = bytes[i..i + 4].iter().collect();
        if window.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(year) = window.parse::<i64>() {
                if (1900..=2100).contains(&year) {
                    return Some(year);
                }
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(s: &str) -> RuleInputs {
        RuleInputs {
            tenure_raw: Some(s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn freehold_variants_normalize() {
        assert_eq!(classify(&raw("Freehold")).unwrap(), "Freehold");
        assert_eq!(classify(&raw("FH")).unwrap(), "Freehold");
    }

    #[test]
    fn leasehold_durations_normalize() {
        assert_eq!(
            classify(&raw("99 yrs lease commencing from 2012")).unwrap(),
            "99-year Leasehold"
        );
        assert_eq!(classify(&raw("999 yrs leasehold")).unwrap(), "999-year Leasehold");
    }

    #[test]
    fn lease_start_year_is_extracted_from_text() {
        let year = lease_start_year(&raw("99 yrs lease commencing from 2012")).unwrap();
        assert_eq!(year, 2012);
    }

    #[test]
    fn freehold_remaining_lease_is_sentinel_999() {
        assert_eq!(remaining_lease(&raw("Freehold")).unwrap(), 999);
    }

    #[test]
    fn leasehold_remaining_lease_counts_down() {
        let mut inputs = raw("99 yrs lease commencing from 2000");
        inputs.transaction_date = NaiveDate::from_ymd_opt(2020, 1, 1);
        assert_eq!(remaining_lease(&inputs).unwrap(), 79);
    }
}
