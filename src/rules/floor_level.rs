//! Floor-level tier classifier: buckets a (normalized) floor range into a
//! coarse tier used for headline aggregation (`group_by=floor_level`).

use super::RuleInputs;
use crate::error::CoreError;
use crate::fingerprint::normalize_floor_range;

pub fn classify(inputs: &RuleInputs) -> Result<String, CoreError> {
    let raw = inputs.floor_range.as_deref().ok_or_else(|| CoreError::Classifier {
        rule: "floor_level".to_string(),
        message: "floor_range is required".to_string(),
    })?;

    let normalized = normalize_floor_range(raw).ok_or_else(|| CoreError::Classifier {
        rule: "floor_level".to_string(),
        message: format!("unparseable floor_range '{raw}'"),
    })?;

    if normalized.to_uppercase().starts_with('B') {
        return Ok("Basement".to_string());
    }

    let low = normalized
        .split('-')
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| CoreError::Classifier {
            rule: "floor_level".to_string(),
            message: format!("unparseable floor_range '{raw}'"),
        })?;

    let tier = match low {
        0..=5 => "Low",
        6..=15 => "Mid",
        16..=30 => "High",
        _ => "Penthouse",
    };
    Ok(tier.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(floor: &str) -> RuleInputs {
        RuleInputs {
            floor_range: Some(floor.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn low_floors_classify_as_low() {
        assert_eq!(classify(&inputs("01 to 05")).unwrap(), "Low");
    }

    #[test]
    fn mid_floors_classify_as_mid() {
        assert_eq!(classify(&inputs("11-15")).unwrap(), "Mid");
    }

    #[test]
    fn very_high_floors_classify_as_penthouse() {
        assert_eq!(classify(&inputs("36-40")).unwrap(), "Penthouse");
    }

    #[test]
    fn basement_is_its_own_tier() {
        assert_eq!(classify(&inputs("B1-B2")).unwrap(), "Basement");
    }

    #[test]
    fn missing_floor_range_is_classifier_error() {
        assert!(classify(&RuleInputs::default()).is_err());
    }
}
