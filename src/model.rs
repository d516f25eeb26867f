use crate::dates;
use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use strum::{Display, EnumString};
use umya_spreadsheet::Cell;

/// A cell value as the engine sees it, whatever the workbook stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    FormulaResult(f64),
    /// A number carrying a date number format.
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn from_cell(cell: Option<&Cell>) -> Self {
        let Some(cell) = cell else {
            return CellValue::Empty;
        };
        let raw = cell.get_value();
        let trimmed = raw.trim();

        if cell.is_formula() {
            return match trimmed.parse::<f64>() {
                Ok(number) => CellValue::FormulaResult(number),
                Err(_) if trimmed.is_empty() => CellValue::Empty,
                Err(_) => CellValue::Text(raw.to_string()),
            };
        }
        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        match trimmed.parse::<f64>() {
            Ok(number) => {
                let date_formatted = cell
                    .get_style()
                    .get_number_format()
                    .map(|fmt| dates::is_date_format(fmt.get_format_code()))
                    .unwrap_or(false);
                if date_formatted {
                    if let Some(datetime) = dates::serial_to_datetime(number) {
                        return CellValue::Date(datetime);
                    }
                }
                CellValue::Number(number)
            }
            Err(_) => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Number(_) | CellValue::FormulaResult(_))
    }

    /// The one numeric coercion used for every count in the engine.
    ///
    /// Precedence: direct number, then formula result, then a numeric string.
    /// Negative or non-finite values do not coerce.
    pub fn as_count(&self) -> Option<u32> {
        let number = match self {
            CellValue::Number(n) => *n,
            CellValue::FormulaResult(n) => *n,
            CellValue::Text(text) => text.trim().replace(',', "").parse::<f64>().ok()?,
            CellValue::Empty | CellValue::Date(_) => return None,
        };
        if number.is_finite() && number >= 0.0 && number <= f64::from(u32::MAX) {
            Some(number.round() as u32)
        } else {
            None
        }
    }

    pub fn coerce_count(&self) -> u32 {
        self.as_count().unwrap_or(0)
    }

    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.trim().to_string(),
            CellValue::Number(n) | CellValue::FormulaResult(n) => format_number(*n),
            CellValue::Date(datetime) => dates::format_dmy(datetime.date()),
        }
    }
}

pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// One tour row extracted from the dispatch sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TourRecord {
    pub name: String,
    pub departure_time: String,
    pub notes: String,
    pub adult_count: u32,
    pub child_count: u32,
    pub comp_count: u32,
}

impl TourRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_counts(mut self, adults: u32, children: u32, comp: u32) -> Self {
        self.adult_count = adults;
        self.child_count = children;
        self.comp_count = comp;
        self
    }

    pub fn with_departure(mut self, departure: impl Into<String>) -> Self {
        self.departure_time = departure.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn passengers(&self) -> u64 {
        u64::from(self.adult_count) + u64::from(self.child_count) + u64::from(self.comp_count)
    }
}

/// Header metadata read from fixed cells of the dispatch sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportHeader {
    pub country: String,
    pub cruise_line: String,
    pub ship_name: String,
    pub port: String,
    /// Normalised to `DD/MM/YYYY` when the source held a date.
    pub report_date: String,
    pub tour_operator: String,
    pub shorex_manager: String,
    pub assistant_manager: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsAccumulator {
    pub adults: u64,
    pub children: u64,
    pub comp: u64,
}

impl TotalsAccumulator {
    pub fn new(adults: u64, children: u64, comp: u64) -> Self {
        Self {
            adults,
            children,
            comp,
        }
    }

    pub fn add_record(&mut self, record: &TourRecord) {
        self.adults += u64::from(record.adult_count);
        self.children += u64::from(record.child_count);
        self.comp += u64::from(record.comp_count);
    }

    pub fn grand_total(&self) -> u64 {
        self.adults + self.children + self.comp
    }
}

impl Add for TotalsAccumulator {
    type Output = TotalsAccumulator;

    fn add(self, rhs: Self) -> Self::Output {
        TotalsAccumulator {
            adults: self.adults + rhs.adults,
            children: self.children + rhs.children,
            comp: self.comp + rhs.comp,
        }
    }
}

impl AddAssign for TotalsAccumulator {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportKind {
    Eod,
    Pax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GenerationMode {
    Fresh,
    Append,
}

/// What the engine hands back to its caller after a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub kind: ReportKind,
    pub mode: GenerationMode,
    pub record_count: usize,
    pub totals: TotalsAccumulator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_name: Option<String>,
    pub warnings: Vec<String>,
    pub output: String,
}
