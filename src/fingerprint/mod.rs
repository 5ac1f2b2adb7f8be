//! Fingerprinting utilities: file-level change detection, header-drift
//! detection, and the row-hash idempotency primitive.
//!
//! All three hashes are stable and reproducible across runs and across
//! process restarts -- nothing here depends on hash-map iteration order or
//! any other non-deterministic input.

mod normalize;

pub use normalize::{canonicalize_area_sqft, normalize_floor_range};

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Streaming SHA-256 over a file's bytes. Used for whole-file change
/// detection between ingest runs: if the file is byte-identical, the hash
/// is identical.
pub fn compute_file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Stable hash of a sorted, normalized header list. Detects schema drift
/// between batches: if the publisher adds, removes, or renames columns,
/// this fingerprint changes even if the contract still resolves headers
/// successfully via aliases.
pub fn compute_header_fingerprint(headers: &[String]) -> String {
    let mut normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    normalized.sort();
    let combined = normalized.join("|");
    let digest = Sha256::digest(combined.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// One value going into a row-hash computation. Mirrors the handful of
/// dynamic types a staged CSV row can hold once coerced.
#[derive(Debug, Clone)]
pub enum HashField {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    /// Special-cased: looks up `area_sqft` and canonicalizes to integer
    /// hundredths, eliminating float-format drift between CSV and any
    /// future API source.
    AreaSqftX100(Option<f64>),
    /// Special-cased: normalizes floor-range spelling before hashing.
    FloorRange(Option<String>),
    Null,
}

/// Computes the 32-hex row hash over the natural key fields, in the exact
/// order given, after canonical normalization. This is the dedup and
/// idempotent-promotion primitive: two rows (from the same or different
/// ingest runs) with the same natural key after normalization collapse to
/// the same hash.
///
/// Field normalization rules (must stay in sync with
/// `fingerprint::normalize`, since any change here is a breaking change of
/// the rules version):
/// - dates -> `YYYY-MM-DD`
/// - numbers -> formatted with up to 6 significant digits
/// - strings -> trimmed and lowercased
/// - `area_sqft_x100` -> `round(area_sqft * 100)` as an integer
/// - `floor_range` -> normalized spelling (`"11 to 15"` -> `"11-15"`)
pub fn compute_row_hash(values: &[HashField]) -> String {
    let parts: Vec<String> = values.iter().map(render_hash_field).collect();
    let combined = parts.join("|");
    let digest = Sha256::digest(combined.as_bytes());
    hex::encode(digest)[..32].to_string()
}

fn render_hash_field(field: &HashField) -> String {
    match field {
        HashField::Null => String::new(),
        HashField::Text(s) => s.trim().to_lowercase(),
        HashField::Number(n) => format_significant(*n),
        HashField::Date(d) => d.format("%Y-%m-%d").to_string(),
        HashField::AreaSqftX100(area) => match area.and_then(canonicalize_area_sqft) {
            Some(v) => v.to_string(),
            None => String::new(),
        },
        HashField::FloorRange(range) => match range.as_deref().and_then(normalize_floor_range) {
            Some(v) => v.trim().to_lowercase(),
            None => String::new(),
        },
    }
}

/// Formats a number the way C's `%.6g` printf conversion does: up to 6
/// significant digits, trimming trailing zeros, no exponent for ordinary
/// transaction-scale magnitudes.
fn format_significant(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    let magnitude = n.abs().log10().floor() as i32;
    let decimals = (5 - magnitude).max(0) as usize;
    let formatted = format!("{:.*}", decimals, n);
    if formatted.contains('.') {
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    } else {
        formatted
    }
}

/// A single fingerprint for an entire batch of files, derived from the
/// sorted `filename:hash` pairs already recorded on the `RunContext`.
/// Lets the ledger detect "this exact set of files, byte-for-byte" without
/// re-hashing anything.
pub fn compute_batch_fingerprint(file_fingerprints: &BTreeMap<String, String>) -> String {
    let combined: Vec<String> = file_fingerprints
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect();
    let digest = Sha256::digest(combined.join("|").as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(project: &str, month: NaiveDate, price: f64, area: f64, floor: &str) -> Vec<HashField> {
        vec![
            HashField::Text(project.to_string()),
            HashField::Date(month),
            HashField::Number(price),
            HashField::AreaSqftX100(Some(area)),
            HashField::FloorRange(Some(floor.to_string())),
        ]
    }

    #[test]
    fn floor_range_spelling_variants_hash_identically() {
        let month = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let h1 = compute_row_hash(&key("The Sail", month, 1_500_000.0, 893.5, "11 to 15"));
        let h2 = compute_row_hash(&key("The Sail", month, 1_500_000.0, 893.5, "11-15"));
        let h3 = compute_row_hash(&key("The Sail", month, 1_500_000.0, 893.5, "11 – 15"));
        assert_eq!(h1, h2);
        assert_eq!(h2, h3);
    }

    #[test]
    fn distinct_prices_produce_distinct_hashes() {
        let month = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let h1 = compute_row_hash(&key("The Sail", month, 1_500_000.0, 893.5, "11-15"));
        let h2 = compute_row_hash(&key("The Sail", month, 1_500_001.0, 893.5, "11-15"));
        assert_ne!(h1, h2);
    }

    #[test]
    fn row_hash_is_32_hex_chars() {
        let month = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let h = compute_row_hash(&key("Parc Clematis", month, 1_200_000.0, 700.0, "06-10"));
        assert_eq!(h.len(), 32);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn header_fingerprint_is_order_independent() {
        let a = vec!["Project Name".to_string(), "Price".to_string()];
        let b = vec!["price".to_string(), "  PROJECT NAME ".to_string()];
        assert_eq!(compute_header_fingerprint(&a), compute_header_fingerprint(&b));
    }

    #[test]
    fn header_fingerprint_is_16_hex_chars() {
        let h = compute_header_fingerprint(&["a".to_string()]);
        assert_eq!(h.len(), 16);
    }

    #[test]
    fn batch_fingerprint_is_order_independent_in_map() {
        let mut a = BTreeMap::new();
        a.insert("b.csv".to_string(), "hash_b".to_string());
        a.insert("a.csv".to_string(), "hash_a".to_string());
        let mut b = BTreeMap::new();
        b.insert("a.csv".to_string(), "hash_a".to_string());
        b.insert("b.csv".to_string(), "hash_b".to_string());
        assert_eq!(compute_batch_fingerprint(&a), compute_batch_fingerprint(&b));
    }
}
