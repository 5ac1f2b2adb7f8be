//! Numeric/string coercion helpers for raw CSV cell values.

/// Parses a decimal after stripping currency symbols, thousands separators
/// and surrounding whitespace: `"$ 1,234,567.00"` -> `1234567.0`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

pub fn parse_integer(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<i64>().ok()
}

pub fn clean_string(raw: &str) -> String {
    raw.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_currency_and_commas() {
        assert_eq!(parse_decimal("$1,234,567.50"), Some(1234567.50));
    }

    #[test]
    fn strips_plain_whitespace() {
        assert_eq!(parse_decimal("  893.5  "), Some(893.5));
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("   "), None);
    }

    #[test]
    fn integer_strips_non_digits() {
        assert_eq!(parse_integer("1,024 units"), Some(1024));
    }
}
