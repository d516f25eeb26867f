use std::path::Path;

pub fn column_number_to_name(column: u32) -> String {
    let mut column = column;
    let mut name = String::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        name.insert(0, (b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    name
}

/// Parses column letters (`"A"`, `"h"`, `"AB"`) into a 1-based column number.
pub fn column_name_to_number(name: &str) -> Option<u32> {
    let trimmed = name.trim().trim_start_matches('$');
    if trimmed.is_empty() || trimmed.len() > 3 {
        return None;
    }
    let mut column = 0u32;
    for ch in trimmed.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        column = column * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(column)
}

pub fn cell_address(column: u32, row: u32) -> String {
    format!("{}{}", column_number_to_name(column), row)
}

pub fn absolute_cell_address(column: u32, row: u32) -> String {
    format!("${}${}", column_number_to_name(column), row)
}

/// Parses an A1 reference (absolute markers allowed) into `(column, row)`.
pub fn parse_cell_address(address: &str) -> Option<(u32, u32)> {
    let cleaned: String = address.trim().chars().filter(|c| *c != '$').collect();
    let split = cleaned.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);
    let column = column_name_to_number(letters)?;
    let row = digits.parse::<u32>().ok().filter(|row| *row > 0)?;
    Some((column, row))
}

/// Parses `A1:B2` (or a single cell) into `(top, left, bottom, right)`.
pub fn parse_range_bounds(range: &str) -> Option<(u32, u32, u32, u32)> {
    let (start, end) = range.split_once(':').unwrap_or((range, range));
    let (c1, r1) = parse_cell_address(start)?;
    let (c2, r2) = parse_cell_address(end)?;
    Some((r1.min(r2), c1.min(c2), r1.max(r2), c1.max(c2)))
}

/// Strips a sheet prefix (`'Dec 25'!$C$12` → `$C$12`) from a defined-name address.
pub fn strip_sheet_prefix(address: &str) -> (Option<String>, &str) {
    match address.trim().trim_start_matches('=').rsplit_once('!') {
        Some((sheet, tail)) => {
            let sheet = sheet.trim();
            let sheet = sheet
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .map(|s| s.replace("''", "'"))
                .unwrap_or_else(|| sheet.to_string());
            (Some(sheet), tail)
        }
        None => (None, address.trim().trim_start_matches('=')),
    }
}

pub fn quote_sheet_name(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

pub fn path_to_forward_slashes(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if raw.contains('\\') {
        raw.replace('\\', "/")
    } else {
        raw.into_owned()
    }
}
