// Utility helpers for parsing and formatting.
//
// Spreadsheet exports are messy: numbers arrive as text with thousands
// separators, dates arrive as Excel serials or in a handful of text layouts.
// Everything that tolerates that mess lives here so the loader and the
// reports can work with clean, typed values.
use chrono::{Duration, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<f64>() {
        return Some(n).filter(|n| n.is_finite());
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Convert an Excel serial day number (1900 date system) to a calendar date.
/// The time-of-day fraction is dropped.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    // Day zero is 1899-12-30 so that Excel's phantom 1900-02-29 lines up.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Text rendering of a numeric cell: integral values lose the `.0`
/// so codes like `304` survive a trip through a float column.
pub fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Arithmetic mean of the defined values. Undefined entries are skipped;
/// if nothing is defined the mean is undefined too.
pub fn mean_defined(values: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.is_empty() {
        return None;
    }
    Some(defined.iter().sum::<f64>() / defined.len() as f64)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Render a ratio as a percentage string (`0.3333` -> `33.3%` at one decimal).
/// Undefined ratios render as `N/A`.
pub fn format_percent(ratio: Option<f64>, decimals: usize) -> String {
    match ratio {
        Some(r) if r.is_finite() => format!("{:.*}%", decimals, r * 100.0),
        _ => "N/A".to_string(),
    }
}

/// Compact rendering for chart values: up to four decimals, trailing zeros dropped.
pub fn format_value(n: f64) -> String {
    let s = format!("{:.4}", n);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_with_separators() {
        assert_eq!(parse_f64_safe(Some(" 1,234.5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn parses_exponent_forms_but_not_infinities() {
        assert_eq!(parse_f64_safe(Some("1E+03")), Some(1000.0));
        assert_eq!(parse_f64_safe(Some("2.5e-1")), Some(0.25));
        assert_eq!(parse_f64_safe(Some("inf")), None);
        assert_eq!(parse_f64_safe(Some("NaN")), None);
    }

    #[test]
    fn parses_supported_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 13);
        assert_eq!(parse_date_safe(Some("2024-05-13")), expected);
        assert_eq!(parse_date_safe(Some("13/05/2024")), expected);
        assert_eq!(parse_date_safe(Some("2024-05-13 00:00:00")), expected);
        assert_eq!(parse_date_safe(Some("2024-05-13T08:30:00")), expected);
        assert_eq!(parse_date_safe(Some("last monday")), None);
    }

    #[test]
    fn converts_excel_serials() {
        // 45425 is 2024-05-13 in the 1900 date system.
        assert_eq!(excel_serial_to_date(45425.0), NaiveDate::from_ymd_opt(2024, 5, 13));
        assert_eq!(excel_serial_to_date(45425.75), NaiveDate::from_ymd_opt(2024, 5, 13));
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn integral_numbers_become_plain_codes() {
        assert_eq!(number_to_text(304.0), "304");
        assert_eq!(number_to_text(12.5), "12.5");
    }

    #[test]
    fn mean_skips_undefined_values() {
        let mean = mean_defined(&[Some(0.2), None, Some(0.4)]).unwrap();
        assert!((mean - 0.3).abs() < 1e-12);
        assert_eq!(mean_defined(&[None, None]), None);
        assert_eq!(mean_defined(&[]), None);
    }

    #[test]
    fn formats_numbers_and_percentages() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(13.5, 0), "14");
        assert_eq!(format_number(-0.2, 0), "0");
        assert_eq!(format_percent(Some(10.0 / 30.0), 1), "33.3%");
        assert_eq!(format_percent(Some(0.125), 2), "12.50%");
        assert_eq!(format_percent(None, 1), "N/A");
        assert_eq!(format_int(9855usize), "9,855");
    }

    #[test]
    fn chart_values_drop_trailing_zeros() {
        assert_eq!(format_value(13.5), "13.5");
        assert_eq!(format_value(30.0), "30");
        assert_eq!(format_value(0.0), "0");
    }
}
