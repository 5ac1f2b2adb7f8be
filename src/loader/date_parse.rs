//! Tolerant date parsing for the handful of date shapes URA-style condo
//! extracts actually use. Always normalizes to the first day of the month.

use chrono::NaiveDate;

const MONTH_ABBR: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const MONTH_FULL: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Parses `"Dec-20"`, `"December 2020"`, `"2020-12-01"`, `"2020/12/01"` into
/// the first day of that month. Two-digit years use the POSIX-style pivot:
/// `00-68` -> `20xx`, `69-99` -> `19xx`.
pub fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(date) = parse_iso(trimmed) {
        return Some(first_of_month(date));
    }
    if let Some(date) = parse_mon_dash_yy(trimmed) {
        return Some(first_of_month(date));
    }
    if let Some(date) = parse_month_name_year(trimmed) {
        return Some(first_of_month(date));
    }
    None
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    use chrono::Datelike;
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

/// `"Dec-20"` / `"Dec-2020"`.
fn parse_mon_dash_yy(s: &str) -> Option<NaiveDate> {
    let (month_str, year_str) = s.split_once('-')?;
    let month = month_index(month_str)? as u32 + 1;
    let year = resolve_year(year_str)?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// `"December 2020"` / `"Dec 2020"`.
fn parse_month_name_year(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split_whitespace();
    let month_str = parts.next()?;
    let year_str = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let month = month_index(month_str)? as u32 + 1;
    let year = resolve_year(year_str)?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn month_index(s: &str) -> Option<usize> {
    let lower = s.trim().to_lowercase();
    MONTH_ABBR
        .iter()
        .position(|m| *m == lower)
        .or_else(|| MONTH_FULL.iter().position(|m| *m == lower))
}

/// Resolves a year token that may be 2 or 4 digits. 2-digit years pivot
/// `00-68 -> 20xx`, `69-99 -> 19xx`.
fn resolve_year(s: &str) -> Option<i32> {
    let digits = s.trim();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match digits.len() {
        4 => digits.parse::<i32>().ok(),
        2 => {
            let two_digit: i32 = digits.parse().ok()?;
            Some(if two_digit <= 68 { 2000 + two_digit } else { 1900 + two_digit })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mon_dash_two_digit_year() {
        assert_eq!(
            parse_transaction_date("Dec-20"),
            NaiveDate::from_ymd_opt(2020, 12, 1)
        );
    }

    #[test]
    fn parses_month_name_full_year() {
        assert_eq!(
            parse_transaction_date("December 2020"),
            NaiveDate::from_ymd_opt(2020, 12, 1)
        );
    }

    #[test]
    fn parses_iso_and_slash_forms() {
        assert_eq!(
            parse_transaction_date("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(
            parse_transaction_date("2024/02/29"),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn two_digit_year_pivot() {
        assert_eq!(
            parse_transaction_date("Jan-69").map(|d| d.format("%Y").to_string()),
            Some("1969".to_string())
        );
        assert_eq!(
            parse_transaction_date("Jan-68").map(|d| d.format("%Y").to_string()),
            Some("2068".to_string())
        );
    }

    #[test]
    fn garbage_input_is_none() {
        assert_eq!(parse_transaction_date("not a date"), None);
        assert_eq!(parse_transaction_date(""), None);
    }
}
