//! Date handling shared by header extraction and tab routing.

use crate::model::CellValue;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Text patterns tried in order; the first that parses wins.
pub const DATE_PATTERNS: &[&str] = &["%d/%m/%Y", "%m/%d/%Y", "%Y-%m-%d", "%d/%b/%Y", "%d-%b-%Y"];

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Converts an Excel 1900-system serial into a date-time.
///
/// Serials below 61 predate the phantom 29 February 1900, so they count from
/// 31 December 1899; later serials count from 30 December 1899.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        return None;
    }
    let epoch = if serial < 61.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * SECONDS_PER_DAY).round() as i64;
    let date = epoch.checked_add_signed(Duration::days(days))?;
    date.and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::seconds(seconds))
}

pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    serial_to_datetime(serial).map(|dt| dt.date())
}

/// Whether a number format code renders a calendar date.
pub fn is_date_format(code: &str) -> bool {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;
    for ch in code.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            _ if in_quotes || in_brackets => {}
            'd' | 'D' | 'y' | 'Y' => return true,
            _ => {}
        }
    }
    false
}

pub fn format_dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Upper-cases the first letter of every alphabetic run: `10/oct/2025` → `10/Oct/2025`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Date-times written as text keep only their date part.
    let date_part = trimmed
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(trimmed);
    for candidate in [trimmed, date_part] {
        let normalized = title_case(candidate);
        for pattern in DATE_PATTERNS {
            if let Ok(date) = NaiveDate::parse_from_str(&normalized, pattern) {
                return Some(date);
            }
        }
    }
    None
}

/// Parses any of the accepted date representations held by a cell.
pub fn parse_date_value(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Date(datetime) => Some(datetime.date()),
        CellValue::Number(serial) | CellValue::FormulaResult(serial) => serial_to_date(*serial),
        CellValue::Text(text) => parse_date_text(text),
        CellValue::Empty => None,
    }
}

/// Normalises a header date cell to `DD/MM/YYYY`; unrecognised text passes through.
pub fn normalize_header_date(value: &CellValue) -> String {
    match value {
        CellValue::Date(datetime) => format_dmy(datetime.date()),
        CellValue::Number(serial) | CellValue::FormulaResult(serial) => serial_to_date(*serial)
            .map(format_dmy)
            .unwrap_or_else(|| value.as_text()),
        CellValue::Text(text) => text.trim().to_string(),
        CellValue::Empty => String::new(),
    }
}

/// Renders a departure cell for display: day fractions and date-times become `HH:MM`.
pub fn format_departure(value: &CellValue) -> String {
    match value {
        CellValue::Date(datetime) => datetime.format("%H:%M").to_string(),
        CellValue::Number(n) | CellValue::FormulaResult(n) if (0.0..1.0).contains(n) => {
            let total_minutes = (n * 24.0 * 60.0).round() as u32;
            format!("{:02}:{:02}", (total_minutes / 60) % 24, total_minutes % 60)
        }
        other => other.as_text(),
    }
}
