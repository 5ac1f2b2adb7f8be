//! Region classifier: a static district -> {CCR, RCR, OCR} map.
//!
//! This table is also used (unmodified) to expand the aggregation engine's
//! `segments[]` filter into a district set, and by the aggregation engine's
//! static `region` group-by `CASE` expression -- one table, three
//! consumers, never re-derived.

use super::RuleInputs;
use crate::error::CoreError;

/// `(district, region)` pairs, URA market-segment convention.
pub const REGION_BY_DISTRICT: &[(&str, &str)] = &[
    ("D01", "CCR"),
    ("D02", "CCR"),
    ("D04", "CCR"),
    ("D06", "CCR"),
    ("D09", "CCR"),
    ("D10", "CCR"),
    ("D11", "CCR"),
    ("D03", "RCR"),
    ("D05", "RCR"),
    ("D07", "RCR"),
    ("D08", "RCR"),
    ("D12", "RCR"),
    ("D13", "RCR"),
    ("D14", "RCR"),
    ("D15", "RCR"),
    ("D20", "RCR"),
    ("D21", "RCR"),
    ("D16", "OCR"),
    ("D17", "OCR"),
    ("D18", "OCR"),
    ("D19", "OCR"),
    ("D22", "OCR"),
    ("D23", "OCR"),
    ("D24", "OCR"),
    ("D25", "OCR"),
    ("D26", "OCR"),
    ("D27", "OCR"),
    ("D28", "OCR"),
];

pub fn classify(inputs: &RuleInputs) -> Result<String, CoreError> {
    let district = inputs.district.as_deref().ok_or_else(|| CoreError::Classifier {
        rule: "region".to_string(),
        message: "district is required".to_string(),
    })?;
    let normalized = district.trim().to_uppercase();

    REGION_BY_DISTRICT
        .iter()
        .find(|(d, _)| *d == normalized)
        .map(|(_, region)| region.to_string())
        .ok_or_else(|| CoreError::Classifier {
            rule: "region".to_string(),
            message: format!("unknown district '{district}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(district: &str) -> RuleInputs {
        RuleInputs {
            district: Some(district.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn every_district_maps_to_exactly_one_region() {
        assert_eq!(REGION_BY_DISTRICT.len(), 28);
    }

    #[test]
    fn d01_is_ccr() {
        assert_eq!(classify(&inputs("D01")).unwrap(), "CCR");
    }

    #[test]
    fn d19_is_ocr() {
        assert_eq!(classify(&inputs("D19")).unwrap(), "OCR");
    }

    #[test]
    fn lowercase_district_resolves() {
        assert_eq!(classify(&inputs("d15")).unwrap(), "RCR");
    }

    #[test]
    fn unknown_district_is_classifier_error() {
        assert!(classify(&inputs("D99")).is_err());
    }
}
