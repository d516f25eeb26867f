//! Row shifting for formulas copied out of a template section.

use crate::utils::{column_number_to_name, quote_sheet_name};
use anyhow::{Result, anyhow, bail};
use formualizer_parse::parser::ReferenceType;
use formualizer_parse::{ASTNode, ASTNodeType, LiteralValue};

pub fn parse_formula(formula: &str) -> Result<ASTNode> {
    let trimmed = formula.trim();
    let with_equals = if trimmed.starts_with('=') {
        trimmed.to_string()
    } else {
        format!("={trimmed}")
    };
    formualizer_parse::parse(&with_equals)
        .map_err(|e| anyhow!("failed to parse formula {trimmed:?}: {}", e.message))
}

/// Moves every relative row reference in `formula` by `delta` rows.
///
/// `$`-anchored rows stay put and columns never move. The result carries no
/// leading `=`, matching what `Cell::set_formula` expects.
pub fn shift_formula_rows(formula: &str, delta: i64) -> Result<String> {
    if delta == 0 {
        return Ok(formula.trim().trim_start_matches('=').to_string());
    }
    let ast = parse_formula(formula)?;
    shift_node(&ast, delta)
}

fn shift_node(node: &ASTNode, delta: i64) -> Result<String> {
    Ok(match &node.node_type {
        ASTNodeType::Literal(value) => match value {
            LiteralValue::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
            _ => format!("{value}"),
        },
        ASTNodeType::Reference {
            original,
            reference,
        } => shift_reference(original, reference, delta)?,
        ASTNodeType::UnaryOp { op, expr } => format!("{}{}", op, shift_node(expr, delta)?),
        ASTNodeType::BinaryOp { op, left, right } => {
            if op == ":" {
                format!("{}:{}", shift_node(left, delta)?, shift_node(right, delta)?)
            } else {
                format!(
                    "{} {} {}",
                    shift_node(left, delta)?,
                    op,
                    shift_node(right, delta)?
                )
            }
        }
        ASTNodeType::Function { name, args } => {
            let args = args
                .iter()
                .map(|arg| shift_node(arg, delta))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            format!("{}({})", name.to_uppercase(), args)
        }
        ASTNodeType::Array(rows) => {
            let rows = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|arg| shift_node(arg, delta))
                        .collect::<Result<Vec<_>>>()
                        .map(|parts| parts.join(", "))
                })
                .collect::<Result<Vec<_>>>()?
                .join("; ");
            format!("{{{rows}}}")
        }
    })
}

fn shift_reference(original: &str, reference: &ReferenceType, delta: i64) -> Result<String> {
    match reference {
        ReferenceType::Cell { sheet, row, col } => {
            let anchors = Anchors::of(coordinate_part(original));
            let row = shift_row(*row, anchors.row, delta)?;
            Ok(format!(
                "{}{}",
                sheet_prefix(sheet),
                format_coord(Some(*col), Some(row), anchors)
            ))
        }
        ReferenceType::Range {
            sheet,
            start_row,
            start_col,
            end_row,
            end_col,
        } => {
            let part = coordinate_part(original);
            let (start, end) = part.split_once(':').unwrap_or((part, part));
            let start_anchors = Anchors::of(start);
            let end_anchors = Anchors::of(end);
            let start_row = start_row
                .map(|row| shift_row(row, start_anchors.row, delta))
                .transpose()?;
            let end_row = end_row
                .map(|row| shift_row(row, end_anchors.row, delta))
                .transpose()?;

            let start = format_coord(*start_col, start_row, start_anchors);
            let end = format_coord(*end_col, end_row, end_anchors);
            if start.is_empty() || end.is_empty() {
                bail!("range reference {original} cannot be shifted");
            }
            Ok(format!("{}{start}:{end}", sheet_prefix(sheet)))
        }
        ReferenceType::Table(_) | ReferenceType::NamedRange(_) => Ok(reference.to_string()),
    }
}

fn shift_row(row: u32, anchored: bool, delta: i64) -> Result<u32> {
    if anchored {
        return Ok(row);
    }
    let shifted = i64::from(row) + delta;
    if shifted < 1 || shifted > i64::from(u32::MAX) {
        bail!("row {row} shifted by {delta} leaves the worksheet");
    }
    Ok(shifted as u32)
}

fn coordinate_part(original: &str) -> &str {
    original
        .rsplit_once('!')
        .map(|(_, tail)| tail)
        .unwrap_or(original)
        .trim()
}

#[derive(Debug, Clone, Copy)]
struct Anchors {
    col: bool,
    row: bool,
}

impl Anchors {
    fn of(coord: &str) -> Self {
        let bytes = coord.as_bytes();
        let mut i = 0;
        let leading = bytes.first() == Some(&b'$');
        if leading {
            i += 1;
        }
        let letters_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let has_letters = i > letters_start;
        let second = bytes.get(i) == Some(&b'$');
        let digits_start = if second { i + 1 } else { i };
        let has_digits = bytes
            .get(digits_start)
            .is_some_and(|byte| byte.is_ascii_digit());

        if has_letters {
            Self {
                col: leading,
                row: second && has_digits,
            }
        } else {
            Self {
                col: false,
                row: leading && has_digits,
            }
        }
    }
}

fn format_coord(col: Option<u32>, row: Option<u32>, anchors: Anchors) -> String {
    let mut out = String::new();
    if let Some(col) = col {
        if anchors.col {
            out.push('$');
        }
        out.push_str(&column_number_to_name(col));
    }
    if let Some(row) = row {
        if anchors.row {
            out.push('$');
        }
        out.push_str(&row.to_string());
    }
    out
}

fn sheet_prefix(sheet: &Option<String>) -> String {
    match sheet {
        Some(name) => format!("{}!", quote_sheet_name(name)),
        None => String::new(),
    }
}
