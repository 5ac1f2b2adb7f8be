//! District derivation from postal code or planning-area name, used when a
//! CSV source reports one of those instead of a district code directly.

use super::RuleInputs;
use crate::error::CoreError;

/// Postal sector (first two digits of a 6-digit Singapore postal code) ->
/// district. Keyed on sector prefix, not the full code.
// TODO: extend to the full URA postal-sector table; only the sectors
// exercised by current fixtures are populated.
const DISTRICT_BY_POSTAL_SECTOR: &[(&str, &str)] = &[
    ("01", "D01"), ("02", "D01"), ("03", "D01"), ("04", "D01"), ("05", "D01"), ("06", "D01"),
    ("07", "D02"), ("08", "D02"),
    ("14", "D03"), ("15", "D03"), ("16", "D03"),
    ("09", "D04"), ("10", "D04"),
    ("11", "D05"), ("12", "D05"), ("13", "D05"),
    ("17", "D06"),
    ("18", "D07"), ("19", "D07"),
    ("20", "D08"), ("21", "D08"),
    ("22", "D09"), ("23", "D09"),
    ("24", "D10"), ("25", "D10"), ("26", "D10"), ("27", "D10"),
    ("28", "D11"), ("29", "D11"), ("30", "D11"),
    ("31", "D12"), ("32", "D12"), ("33", "D12"),
    ("34", "D13"), ("35", "D13"), ("36", "D13"), ("37", "D13"),
    ("38", "D14"), ("39", "D14"), ("40", "D14"), ("41", "D14"),
    ("42", "D15"), ("43", "D15"), ("44", "D15"), ("45", "D15"),
    ("46", "D16"), ("47", "D16"), ("48", "D16"),
    ("49", "D17"), ("50", "D17"), ("81", "D17"),
    ("51", "D18"), ("52", "D18"),
    ("53", "D19"), ("54", "D19"), ("55", "D19"), ("82", "D19"),
    ("56", "D20"), ("57", "D20"),
    ("58", "D21"), ("59", "D21"),
    ("60", "D22"), ("61", "D22"), ("62", "D22"), ("63", "D22"), ("64", "D22"),
    ("65", "D23"), ("66", "D23"), ("67", "D23"), ("68", "D23"),
    ("69", "D24"), ("70", "D24"), ("71", "D24"),
    ("72", "D25"), ("73", "D25"),
    ("77", "D26"), ("78", "D26"),
    ("75", "D27"), ("76", "D27"),
    ("79", "D28"), ("80", "D28"),
];

const DISTRICT_BY_PLANNING_AREA: &[(&str, &str)] = &[
    ("downtown core", "D01"),
    ("marina east", "D01"),
    ("museum", "D06"),
    ("newton", "D09"),
    ("orchard", "D09"),
    ("tanglin", "D10"),
    ("bukit timah", "D10"),
    ("novena", "D11"),
    ("toa payoh", "D12"),
    ("geylang", "D14"),
    ("marine parade", "D15"),
    ("bedok", "D16"),
    ("tampines", "D18"),
    ("pasir ris", "D18"),
    ("serangoon", "D19"),
    ("hougang", "D19"),
    ("ang mo kio", "D20"),
    ("bishan", "D20"),
    ("bukit batok", "D23"),
    ("bukit panjang", "D23"),
    ("choa chu kang", "D24"),
    ("woodlands", "D25"),
    ("yishun", "D27"),
    ("sembawang", "D27"),
    ("punggol", "D19"),
    ("sengkang", "D19"),
    ("jurong east", "D22"),
    ("jurong west", "D22"),
    ("clementi", "D05"),
    ("queenstown", "D03"),
];

pub fn from_postal(inputs: &RuleInputs) -> Result<String, CoreError> {
    let postal = inputs.postal_code.as_deref().ok_or_else(|| CoreError::Classifier {
        rule: "district_from_postal".to_string(),
        message: "postal_code is required".to_string(),
    })?;
    let digits: String = postal.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 2 {
        return Err(CoreError::Classifier {
            rule: "district_from_postal".to_string(),
            message: format!("postal code '{postal}' too short to derive a sector"),
        });
    }
    let sector = &digits[..2];
    DISTRICT_BY_POSTAL_SECTOR
        .iter()
        .find(|(s, _)| *s == sector)
        .map(|(_, d)| d.to_string())
        .ok_or_else(|| CoreError::Classifier {
            rule: "district_from_postal".to_string(),
            message: format!("no district mapping for postal sector '{sector}'"),
        })
}

pub fn from_planning_area(inputs: &RuleInputs) -> Result<String, CoreError> {
    let area = inputs.planning_area.as_deref().ok_or_else(|| CoreError::Classifier {
        rule: "district_from_planning_area".to_string(),
        message: "planning_area is required".to_string(),
    })?;
    let lower = area.trim().to_lowercase();
    DISTRICT_BY_PLANNING_AREA
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, d)| d.to_string())
        .ok_or_else(|| CoreError::Classifier {
            rule: "district_from_planning_area".to_string(),
            message: format!("no district mapping for planning area '{area}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postal_sector_resolves_to_district() {
        let inputs = RuleInputs {
            postal_code: Some("238872".to_string()),
            ..Default::default()
        };
        assert_eq!(from_postal(&inputs).unwrap(), "D09");
    }

    #[test]
    fn planning_area_resolves_to_district() {
        let inputs = RuleInputs {
            planning_area: Some("Bukit Timah".to_string()),
            ..Default::default()
        };
        assert_eq!(from_planning_area(&inputs).unwrap(), "D10");
    }

    #[test]
    fn unmapped_planning_area_is_classifier_error() {
        let inputs = RuleInputs {
            planning_area: Some("Atlantis".to_string()),
            ..Default::default()
        };
        assert!(from_planning_area(&inputs).is_err());
    }
}
