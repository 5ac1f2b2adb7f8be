//! Canonicalization helpers shared by the row-hash computation and (for
//! `area_sqft`) the staging loader's field coercion.

/// Converts `area_sqft` to a stable integer representation: the integer of
/// `area_sqft * 100`, rounded. This preserves two decimal places without the
/// float-formatting ambiguity that would otherwise let a CSV source and a
/// future API source produce different hashes for the same transaction.
///
/// `None`/non-finite input (NaN) maps to `None`.
pub fn canonicalize_area_sqft(area_sqft: f64) -> Option<i64> {
    if !area_sqft.is_finite() {
        return None;
    }
    Some((area_sqft * 100.0).round() as i64)
}

/// Normalizes floor-range spelling so CSV extracts and any future API
/// source produce identical hashes for the same transaction:
/// - `"11 to 15"` / `"11-15"` / `"11 – 15"` (en dash) -> `"11-15"`
/// - basement ranges (`"B1 to B2"`) -> uppercased, same dash normalization
///
/// Anything that doesn't match a known shape passes through unchanged
/// (still trimmed), since floor_range is optional and loosely specified.
pub fn normalize_floor_range(floor_range: &str) -> Option<String> {
    let trimmed = floor_range.trim();
    if trimmed.is_empty() {
        return None;
    }

    let collapsed = collapse_whitespace(trimmed);
    let dashed = collapsed.replace('\u{2013}', "-").replace('\u{2014}', "-");

    if let Some((lo, hi)) = split_to_or_dash(&dashed) {
        let is_basement = lo.to_uppercase().starts_with('B') || hi.to_uppercase().starts_with('B');
        return Some(if is_basement {
            format!("{}-{}", lo.to_uppercase(), hi.to_uppercase())
        } else {
            format!("{lo}-{hi}")
        });
    }

    Some(dashed)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `"11 to 15"` or `"11-15"` / `"B1 to B2"` / `"B1-B2"` into
/// `(lo, hi)`. Case-insensitive on the `to` separator and on the basement
/// `B` prefix.
fn split_to_or_dash(s: &str) -> Option<(String, String)> {
    let lower = s.to_lowercase();
    if let Some(idx) = lower.find(" to ") {
        let (lo, rest) = s.split_at(idx);
        let hi = &rest[" to ".len()..];
        if is_floor_token(lo.trim()) && is_floor_token(hi.trim()) {
            return Some((lo.trim().to_string(), hi.trim().to_string()));
        }
        return None;
    }

    if let Some(idx) = s.find('-') {
        let (lo, rest) = s.split_at(idx);
        let hi = &rest[1..];
        if is_floor_token(lo.trim()) && is_floor_token(hi.trim()) {
            return Some((lo.trim().to_string(), hi.trim().to_string()));
        }
    }
    None
}

fn is_floor_token(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let digits = if let Some(rest) = s.strip_prefix(['B', 'b']) {
        rest
    } else {
        s
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_sqft_rounds_to_hundredths() {
        assert_eq!(canonicalize_area_sqft(1689.95), Some(168995));
        assert_eq!(canonicalize_area_sqft(1689.93), Some(168993));
    }

    #[test]
    fn area_sqft_rejects_nan() {
        assert_eq!(canonicalize_area_sqft(f64::NAN), None);
    }

    #[test]
    fn floor_range_to_dash_variants_converge() {
        assert_eq!(normalize_floor_range("11 to 15"), Some("11-15".to_string()));
        assert_eq!(normalize_floor_range("11-15"), Some("11-15".to_string()));
        assert_eq!(normalize_floor_range("11 - 15"), Some("11-15".to_string()));
    }

    #[test]
    fn basement_ranges_are_uppercased() {
        assert_eq!(normalize_floor_range("b1 to b2"), Some("B1-B2".to_string()));
        assert_eq!(normalize_floor_range("B1-B2"), Some("B1-B2".to_string()));
    }

    #[test]
    fn unmatched_shape_passes_through_trimmed() {
        assert_eq!(normalize_floor_range("  penthouse  "), Some("penthouse".to_string()));
    }

    #[test]
    fn empty_input_is_none() {
        assert_eq!(normalize_floor_range("   "), None);
    }
}
