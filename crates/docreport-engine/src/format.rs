/*
 * format.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Format specifiers for placeholder values.
//!
//! Specifiers follow the composite-format conventions familiar from report
//! templates, rendered with invariant (English) culture:
//!
//! - Dates: custom patterns (`dd.MM.yyyy`, `d MMMM yyyy HH:mm`, quoted
//!   literals, `\x` escapes) and the standard single letters `d D f F g G
//!   m o r s t T u y`.
//! - Numbers: standard specifiers `N F D P X E C G R` with optional
//!   precision, and custom patterns built from `0 # . , % ‰` with literal
//!   text and up to three `;`-separated sections.
//! - Text that reads as an ISO-8601 date or as a number is formatted as one.
//!
//! Nothing here fails: an unusable specifier degrades to the value's
//! default string form.

use crate::value::ParamValue;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Render a value with a format specifier.
pub fn format_value(value: &ParamValue, spec: &str) -> String {
    match value {
        ParamValue::Null => String::new(),
        ParamValue::Text(text) => format_text(text, spec),
        ParamValue::Integer(i) => format_number(Number::Integer(*i), spec),
        ParamValue::Float(f) => format_number(Number::Float(*f), spec),
        ParamValue::Date(d) => format_datetime(&d.and_time(NaiveTime::MIN), spec),
        ParamValue::DateTime(dt) => format_datetime(dt, spec),
        _ => value.render(),
    }
}

fn format_text(text: &str, spec: &str) -> String {
    if let Some(dt) = parse_datetime(text) {
        return format_datetime(&dt, spec);
    }
    if let Some(number) = parse_number(text) {
        return format_number(number, spec);
    }
    text.to_string()
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    const PATTERNS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    PATTERNS
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
}

fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    let numeric = text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !numeric {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::Integer(i));
    }
    text.parse::<f64>().ok().map(Number::Float)
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

fn format_datetime(dt: &NaiveDateTime, spec: &str) -> String {
    let pattern = standard_date_pattern(spec).unwrap_or(spec);
    format_custom_datetime(dt, pattern)
}

fn standard_date_pattern(spec: &str) -> Option<&'static str> {
    let mut chars = spec.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let pattern = match letter {
        'd' => "MM/dd/yyyy",
        'D' => "dddd, dd MMMM yyyy",
        'f' => "dddd, dd MMMM yyyy HH:mm",
        'F' | 'U' => "dddd, dd MMMM yyyy HH:mm:ss",
        'g' => "MM/dd/yyyy HH:mm",
        'G' => "MM/dd/yyyy HH:mm:ss",
        'm' | 'M' => "MMMM dd",
        'o' | 'O' => "yyyy'-'MM'-'dd'T'HH':'mm':'ss'.'fffffff",
        'r' | 'R' => "ddd, dd MMM yyyy HH':'mm':'ss 'GMT'",
        's' => "yyyy'-'MM'-'dd'T'HH':'mm':'ss",
        't' => "HH:mm",
        'T' => "HH:mm:ss",
        'u' => "yyyy'-'MM'-'dd HH':'mm':'ss'Z'",
        'y' | 'Y' => "yyyy MMMM",
        _ => return None,
    };
    Some(pattern)
}

fn format_custom_datetime(dt: &NaiveDateTime, pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let rest = &chars[i + 1..];
                match rest.iter().position(|&q| q == c) {
                    Some(end) => {
                        out.extend(&rest[..end]);
                        i += end + 2;
                    }
                    None => {
                        out.extend(rest);
                        i = chars.len();
                    }
                }
                continue;
            }
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
                continue;
            }
            '%' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        i += run;

        match c {
            'd' => match run {
                1 => out.push_str(&dt.day().to_string()),
                2 => out.push_str(&format!("{:02}", dt.day())),
                3 => out.push_str(&dt.format("%a").to_string()),
                _ => out.push_str(&dt.format("%A").to_string()),
            },
            'M' => match run {
                1 => out.push_str(&dt.month().to_string()),
                2 => out.push_str(&format!("{:02}", dt.month())),
                3 => out.push_str(&dt.format("%b").to_string()),
                _ => out.push_str(&dt.format("%B").to_string()),
            },
            'y' => {
                let year = dt.year();
                match run {
                    1 => out.push_str(&(year % 100).to_string()),
                    2 => out.push_str(&format!("{:02}", year % 100)),
                    width => out.push_str(&format!("{year:0width$}")),
                }
            }
            'h' => push_padded(&mut out, dt.hour12().1, run),
            'H' => push_padded(&mut out, dt.hour(), run),
            'm' => push_padded(&mut out, dt.minute(), run),
            's' => push_padded(&mut out, dt.second(), run),
            'f' | 'F' => {
                let digits = format!("{:09}", dt.nanosecond() % 1_000_000_000);
                let mut fraction = digits[..run.min(9)].to_string();
                if c == 'F' {
                    let trimmed = fraction.trim_end_matches('0').len();
                    fraction.truncate(trimmed);
                    if fraction.is_empty() && out.ends_with('.') {
                        out.pop();
                    }
                }
                out.push_str(&fraction);
            }
            't' => {
                let designator = if dt.hour12().0 { "PM" } else { "AM" };
                out.push_str(if run == 1 { &designator[..1] } else { designator });
            }
            'g' => out.push_str("A.D."),
            'z' => match run {
                1 => out.push_str("+0"),
                2 => out.push_str("+00"),
                _ => out.push_str("+00:00"),
            },
            'K' => {}
            other => {
                for _ in 0..run {
                    out.push(other);
                }
            }
        }
    }
    out
}

fn push_padded(out: &mut String, value: u32, run: usize) {
    if run == 1 {
        out.push_str(&value.to_string());
    } else {
        out.push_str(&format!("{value:02}"));
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    fn is_negative(self) -> bool {
        match self {
            Number::Integer(i) => i < 0,
            Number::Float(f) => f < 0.0,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Integer(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn scaled(self, factor: f64) -> Number {
        if factor == 1.0 {
            self
        } else {
            Number::Float(self.as_f64() * factor)
        }
    }

    /// Integer and fraction digits of the absolute value, rounded to
    /// `decimals` places.
    fn digits(self, decimals: usize) -> (String, String) {
        match self {
            Number::Integer(i) => (i.unsigned_abs().to_string(), "0".repeat(decimals)),
            Number::Float(f) => {
                let text = format!("{:.*}", decimals, f.abs());
                match text.split_once('.') {
                    Some((int, frac)) => (int.to_string(), frac.to_string()),
                    None => (text, String::new()),
                }
            }
        }
    }

    fn render(self) -> String {
        match self {
            Number::Integer(i) => i.to_string(),
            Number::Float(f) => f.to_string(),
        }
    }
}

fn format_number(number: Number, spec: &str) -> String {
    if let Number::Float(f) = number
        && !f.is_finite()
    {
        return if f.is_nan() {
            "NaN".to_string()
        } else if f > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    if spec.is_empty() {
        return number.render();
    }
    match parse_standard(spec) {
        Some((letter, precision)) => {
            format_standard(number, letter, precision).unwrap_or_else(|| number.render())
        }
        None => format_custom_number(number, spec),
    }
}

/// `N2`, `X8`, `F`: one letter plus optional precision digits.
fn parse_standard(spec: &str) -> Option<(char, Option<usize>)> {
    let mut chars = spec.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    let rest = chars.as_str();
    if rest.is_empty() {
        return Some((letter, None));
    }
    if rest.len() <= 2 && rest.chars().all(|c| c.is_ascii_digit()) {
        return Some((letter, rest.parse().ok()));
    }
    None
}

fn format_standard(number: Number, letter: char, precision: Option<usize>) -> Option<String> {
    let formatted = match letter.to_ascii_uppercase() {
        'N' => fixed(number, precision.unwrap_or(2), true),
        'F' => fixed(number, precision.unwrap_or(2), false),
        'P' => format!("{} %", fixed(number.scaled(100.0), precision.unwrap_or(2), true)),
        'C' => {
            let amount = fixed(number, precision.unwrap_or(2), true);
            match amount.strip_prefix('-') {
                Some(positive) => format!("(¤{positive})"),
                None => format!("¤{amount}"),
            }
        }
        'D' => {
            let Number::Integer(i) = number else {
                return None;
            };
            let width = precision.unwrap_or(0);
            let digits = format!("{:0width$}", i.unsigned_abs());
            if i < 0 { format!("-{digits}") } else { digits }
        }
        'X' => {
            let Number::Integer(i) = number else {
                return None;
            };
            let width = precision.unwrap_or(0);
            if letter.is_ascii_uppercase() {
                format!("{i:0width$X}")
            } else {
                format!("{i:0width$x}")
            }
        }
        'E' => exponential(number.as_f64(), precision.unwrap_or(6), letter),
        'G' | 'R' => number.render(),
        _ => return None,
    };
    Some(formatted)
}

fn fixed(number: Number, decimals: usize, grouped: bool) -> String {
    let (int, frac) = number.digits(decimals);
    let int = if grouped { group_thousands(&int) } else { int };
    let nonzero = int.chars().chain(frac.chars()).any(|c| c.is_ascii_digit() && c != '0');
    let sign = if number.is_negative() && nonzero { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{int}")
    } else {
        format!("{sign}{int}.{frac}")
    }
}

fn exponential(value: f64, decimals: usize, letter: char) -> String {
    let text = format!("{:.*e}", decimals, value);
    let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}{letter}{sign}{:03}", exponent.unsigned_abs())
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Digit(char),
    Point,
    Comma,
    Percent,
    PerMille,
    Literal(String),
}

fn format_custom_number(number: Number, pattern: &str) -> String {
    let sections = split_sections(pattern);
    let (section, with_sign) = match sections.as_slice() {
        [only] => (*only, true),
        [positive, negative, ..] if number.is_negative() => {
            if negative.is_empty() {
                (*positive, true)
            } else {
                (*negative, false)
            }
        }
        [_, _, zero, ..] if number.is_zero() => (*zero, true),
        [positive, ..] => (*positive, true),
        [] => return number.render(),
    };
    format_section(number, &tokenize(section), with_sign)
}

fn split_sections(pattern: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in pattern.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (None, '\\') => escaped = true,
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, ';') => {
                sections.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(&pattern[start..]);
    sections
}

fn tokenize(section: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = section.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '0' | '#' => Token::Digit(c),
            '.' => Token::Point,
            ',' => Token::Comma,
            '%' => Token::Percent,
            '‰' => Token::PerMille,
            '\\' => Token::Literal(chars.next().map(String::from).unwrap_or_default()),
            '\'' | '"' => Token::Literal(chars.by_ref().take_while(|&x| x != c).collect()),
            other => Token::Literal(other.to_string()),
        };
        tokens.push(token);
    }
    tokens
}

fn format_section(number: Number, tokens: &[Token], with_sign: bool) -> String {
    let point = tokens
        .iter()
        .position(|t| *t == Token::Point)
        .unwrap_or(tokens.len());
    let int_region = &tokens[..point];

    let int_placeholders: Vec<char> = int_region
        .iter()
        .filter_map(|t| match t {
            Token::Digit(c) => Some(*c),
            _ => None,
        })
        .collect();
    let frac_placeholders: Vec<char> = tokens[point..]
        .iter()
        .filter_map(|t| match t {
            Token::Digit(c) => Some(*c),
            _ => None,
        })
        .collect();

    // Commas between digit placeholders group thousands; commas after the
    // last integer placeholder divide by 1000 each.
    let last_int_digit = int_region.iter().rposition(|t| matches!(t, Token::Digit(_)));
    let first_int_digit = int_region.iter().position(|t| matches!(t, Token::Digit(_)));
    let mut grouping = false;
    let mut scale_exponent = 0;
    for (idx, token) in int_region.iter().enumerate() {
        if *token != Token::Comma {
            continue;
        }
        match (first_int_digit, last_int_digit) {
            (Some(first), Some(last)) if idx > first && idx < last => grouping = true,
            (Some(_), Some(last)) if idx > last => scale_exponent += 1,
            _ => {}
        }
    }

    let percents = tokens.iter().filter(|t| **t == Token::Percent).count();
    let per_milles = tokens.iter().filter(|t| **t == Token::PerMille).count();
    let factor = 100f64.powi(percents as i32) * 1000f64.powi(per_milles as i32)
        / 1000f64.powi(scale_exponent);
    let value = number.scaled(factor);

    let (int_digits, frac_digits) = value.digits(frac_placeholders.len());
    let significant = int_digits.trim_start_matches('0');
    let min_int = int_placeholders
        .iter()
        .position(|&c| c == '0')
        .map_or(0, |z| int_placeholders.len() - z);
    let mut int_text = format!("{significant:0>min_int$}");
    if grouping {
        int_text = group_thousands(&int_text);
    }

    let min_frac = frac_placeholders
        .iter()
        .rposition(|&c| c == '0')
        .map_or(0, |z| z + 1);
    let mut frac_text = frac_digits;
    while frac_text.len() > min_frac && frac_text.ends_with('0') {
        frac_text.pop();
    }

    let nonzero = int_text
        .chars()
        .chain(frac_text.chars())
        .any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if with_sign && number.is_negative() && nonzero {
        out.push('-');
    }

    let int_count = int_placeholders.len();
    let int_chars: Vec<char> = int_text.chars().collect();
    let mut int_seen = 0;
    let mut frac_seen = 0;
    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::Digit(_) if idx < point => {
                if grouping {
                    if int_seen == 0 {
                        out.push_str(&int_text);
                    }
                } else {
                    push_integer_digit(&mut out, &int_chars, int_count, int_seen);
                }
                int_seen += 1;
            }
            Token::Digit(_) => {
                if let Some(c) = frac_text.chars().nth(frac_seen) {
                    out.push(c);
                }
                frac_seen += 1;
            }
            Token::Point if idx == point => {
                if int_count == 0 {
                    out.push_str(&int_text);
                }
                if !frac_text.is_empty() {
                    out.push('.');
                }
            }
            Token::Point | Token::Comma => {}
            Token::Percent => out.push('%'),
            Token::PerMille => out.push('‰'),
            Token::Literal(text) => out.push_str(text),
        }
    }
    out
}

/// Integer digits are right-aligned to the placeholders; surplus digits
/// go to the leftmost one.
fn push_integer_digit(out: &mut String, digits: &[char], placeholders: usize, k: usize) {
    let len = digits.len();
    if k == 0 && len > placeholders {
        out.extend(&digits[..len - placeholders]);
    }
    let offset = placeholders - k;
    if offset <= len {
        out.push(digits[len - offset]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_datetime() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 5)
            .unwrap()
            .and_hms_nano_opt(14, 7, 9, 123_456_789)
            .unwrap()
    }

    fn date(spec: &str) -> String {
        format_value(&ParamValue::DateTime(sample_datetime()), spec)
    }

    fn int(value: i64, spec: &str) -> String {
        format_value(&ParamValue::Integer(value), spec)
    }

    fn float(value: f64, spec: &str) -> String {
        format_value(&ParamValue::Float(value), spec)
    }

    #[test]
    fn test_custom_date_patterns() {
        assert_eq!(date("dd.MM.yyyy"), "05.03.2021");
        assert_eq!(date("d MMMM yyyy"), "5 March 2021");
        assert_eq!(date("ddd, MMM d"), "Fri, Mar 5");
        assert_eq!(date("dddd"), "Friday");
        assert_eq!(date("yy"), "21");
        assert_eq!(date("hh:mm tt"), "02:07 PM");
        assert_eq!(date("H:m:s"), "14:7:9");
        assert_eq!(date("HH:mm:ss.fff"), "14:07:09.123");
    }

    #[test]
    fn test_quoted_and_escaped_literals() {
        assert_eq!(date("'Year' yyyy"), "Year 2021");
        assert_eq!(date("\"on\" dd"), "on 05");
        assert_eq!(date("\\d\\d dd"), "dd 05");
    }

    #[test]
    fn test_standard_date_specifiers() {
        assert_eq!(date("d"), "03/05/2021");
        assert_eq!(date("s"), "2021-03-05T14:07:09");
        assert_eq!(date("t"), "14:07");
        assert_eq!(date("D"), "Friday, 05 March 2021");
    }

    #[test]
    fn test_trailing_f_fraction_is_trimmed() {
        let whole = NaiveDate::from_ymd_opt(2021, 3, 5)
            .unwrap()
            .and_hms_opt(8, 0, 9)
            .unwrap();
        assert_eq!(
            format_value(&ParamValue::DateTime(whole), "ss.FFF"),
            "09"
        );
    }

    #[test]
    fn test_date_value_formats_at_midnight() {
        let value = ParamValue::Date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(format_value(&value, "dd-MM-yyyy HH:mm"), "01-01-2021 00:00");
    }

    #[test]
    fn test_standard_number_specifiers() {
        assert_eq!(int(1_234_567, "N2"), "1,234,567.00");
        assert_eq!(float(1234.5678, "N2"), "1,234.57");
        assert_eq!(float(1234.5678, "F1"), "1234.6");
        assert_eq!(int(42, "D5"), "00042");
        assert_eq!(int(-42, "D5"), "-00042");
        assert_eq!(float(0.1234, "P1"), "12.3 %");
        assert_eq!(int(255, "X"), "FF");
        assert_eq!(int(255, "x4"), "00ff");
        assert_eq!(float(1234.5, "E2"), "1.23E+003");
        assert_eq!(float(-12.3, "N2"), "-12.30");
    }

    #[test]
    fn test_custom_number_patterns() {
        assert_eq!(float(1234.5, "#,##0.00"), "1,234.50");
        assert_eq!(float(2.5, "0.###"), "2.5");
        assert_eq!(float(3.0, "0.###"), "3");
        assert_eq!(int(0, "#,##0"), "0");
        assert_eq!(int(7, "000"), "007");
        assert_eq!(float(0.256, "0.0%"), "25.6%");
        assert_eq!(int(5_551_234_567, "(###) ###-####"), "(555) 123-4567");
        assert_eq!(int(1_500_000, "#,##0,,"), "2");
    }

    #[test]
    fn test_number_sections() {
        assert_eq!(int(5, "0;(0);zero"), "5");
        assert_eq!(int(-5, "0;(0);zero"), "(5)");
        assert_eq!(int(0, "0;(0);zero"), "zero");
        assert_eq!(int(-5, "0.0"), "-5.0");
    }

    #[test]
    fn test_unusable_specifiers_degrade() {
        assert_eq!(float(1.5, "D3"), "1.5");
        assert_eq!(int(12, "Q"), "12");
        assert_eq!(float(f64::NAN, "N2"), "NaN");
    }

    #[test]
    fn test_text_values_are_parsed() {
        let text = |s: &str, spec: &str| format_value(&ParamValue::from(s), spec);
        assert_eq!(text("2021-03-05", "dd/MM/yyyy"), "05/03/2021");
        assert_eq!(text("2021-03-05T10:30:00", "HH:mm"), "10:30");
        assert_eq!(text("1234.5", "N1"), "1,234.5");
        assert_eq!(text("abc", "N2"), "abc");
    }

    #[test]
    fn test_bool_ignores_specifier() {
        assert_eq!(format_value(&ParamValue::Bool(true), "N2"), "true");
    }
}
