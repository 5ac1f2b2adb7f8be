//! Schema Contract: the single source of truth for the logical input schema.
//!
//! Isolates CSV header drift from everything downstream of the loader --
//! every later stage (rules, dedup, promotion, aggregation) only ever sees
//! canonical field names.

mod schema;

pub use schema::{CanonicalField, FieldType, SchemaContract, CURRENT_SCHEMA_VERSION};

use crate::error::CoreError;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Result of resolving a set of raw CSV headers against the contract.
#[derive(Debug, Clone)]
pub struct HeaderResolution {
    /// canonical field name -> source header as seen in the CSV
    pub mapping: BTreeMap<&'static str, String>,
    /// source headers present in the CSV that matched no known alias
    pub unknown_headers: BTreeSet<String>,
}

/// Report describing whether a contract hash transition is backwards
/// compatible. Attached to the batch ledger's `contract_report` column.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompatibilityReport {
    pub previous_hash: String,
    pub current_hash: String,
    pub compatible: bool,
    pub breaking_reasons: Vec<String>,
}

impl SchemaContract {
    /// Stable hex digest over the contract's canonical serialization.
    /// Changing a required field's type/presence changes this hash.
    pub fn contract_hash(&self) -> String {
        let mut canonical: Vec<String> = self
            .fields
            .iter()
            .map(|f| {
                format!(
                    "{}:{}:{}:{}",
                    f.name,
                    f.field_type.as_str(),
                    f.required,
                    f.aliases.join(",")
                )
            })
            .collect();
        canonical.sort();
        let combined = canonical.join("|");
        let digest = Sha256::digest(combined.as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    /// Resolves raw CSV headers (case/whitespace-insensitive) against the
    /// contract's alias table. Fails with `CoreError::Contract` if any
    /// required canonical field has no matching alias.
    pub fn resolve_header(&self, csv_headers: &[String]) -> Result<HeaderResolution, CoreError> {
        let normalized: Vec<(String, &String)> = csv_headers
            .iter()
            .map(|h| (normalize_header(h), h))
            .collect();

        let mut mapping = BTreeMap::new();
        let mut matched_raw: BTreeSet<String> = BTreeSet::new();
        let mut missing_required = Vec::new();

        for field in &self.fields {
            let mut found = None;
            for alias in field.all_aliases() {
                let alias_norm = normalize_header(alias);
                if let Some((_, raw)) = normalized.iter().find(|(n, _)| *n == alias_norm) {
                    found = Some((*raw).clone());
                    break;
                }
            }
            match found {
                Some(raw) => {
                    matched_raw.insert(raw.clone());
                    mapping.insert(field.name, raw);
                }
                None if field.required => missing_required.push(field.name),
                None => {}
            }
        }

        if !missing_required.is_empty() {
            return Err(CoreError::contract(format!(
                "header mismatch: missing required field(s) {}",
                missing_required.join(", ")
            )));
        }

        let unknown_headers = csv_headers
            .iter()
            .filter(|h| !matched_raw.contains(*h))
            .cloned()
            .collect();

        Ok(HeaderResolution {
            mapping,
            unknown_headers,
        })
    }

    /// Compatibility is additive only: adding optional fields is
    /// non-breaking; removing or retyping a required field is breaking.
    pub fn check_compatibility(&self, previous: &SchemaContract) -> CompatibilityReport {
        let mut breaking_reasons = Vec::new();
        let current_hash = self.contract_hash();
        let previous_hash = previous.contract_hash();

        for prev_field in &previous.fields {
            match self.fields.iter().find(|f| f.name == prev_field.name) {
                None if prev_field.required => breaking_reasons.push(format!(
                    "required field '{}' removed",
                    prev_field.name
                )),
                Some(cur_field) if prev_field.required && !cur_field.required => {
                    breaking_reasons.push(format!(
                        "field '{}' changed from required to optional",
                        prev_field.name
                    ));
                }
                Some(cur_field) if cur_field.field_type != prev_field.field_type => {
                    breaking_reasons.push(format!(
                        "field '{}' changed type {:?} -> {:?}",
                        prev_field.name, prev_field.field_type, cur_field.field_type
                    ));
                }
                _ => {}
            }
        }

        CompatibilityReport {
            previous_hash,
            current_hash,
            compatible: breaking_reasons.is_empty(),
            breaking_reasons,
        }
    }
}

fn normalize_header(h: &str) -> String {
    h.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_aliased_headers_case_insensitively() {
        let contract = SchemaContract::condo_v2();
        let headers = vec![
            "Project Name".to_string(),
            "Sale Date".to_string(),
            "Transacted Price ($)".to_string(),
            "Area (SQFT)".to_string(),
            "Postal District".to_string(),
            "Type of Sale".to_string(),
            "Property Type".to_string(),
        ];
        let resolution = contract.resolve_header(&headers).unwrap();
        assert_eq!(resolution.mapping.get("project_name").unwrap(), "Project Name");
        assert_eq!(resolution.mapping.get("price").unwrap(), "Transacted Price ($)");
    }

    #[test]
    fn missing_required_field_is_contract_error() {
        let contract = SchemaContract::condo_v2();
        let headers = vec!["Project Name".to_string()];
        let result = contract.resolve_header(&headers);
        assert!(matches!(result, Err(CoreError::Contract { .. })));
    }

    #[test]
    fn adding_optional_field_is_non_breaking() {
        let previous = SchemaContract::condo_v2();
        let mut current = SchemaContract::condo_v2();
        current.fields.push(CanonicalField {
            name: "market_segment",
            field_type: FieldType::String,
            required: false,
            aliases: vec!["Market Segment".into()],
        });
        let report = current.check_compatibility(&previous);
        assert!(report.compatible);
    }

    #[test]
    fn removing_required_field_is_breaking() {
        let previous = SchemaContract::condo_v2();
        let mut current = SchemaContract::condo_v2();
        current.fields.retain(|f| f.name != "price");
        let report = current.check_compatibility(&previous);
        assert!(!report.compatible);
    }
}
