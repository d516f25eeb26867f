//! Month tab routing for PAX workbooks.

use crate::dates::parse_date_value;
use crate::error::{ReportError, ReportResult, ReportWarning, Warnings};
use crate::model::CellValue;
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use umya_spreadsheet::Spreadsheet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabRoute {
    pub year: i32,
    pub month: u32,
    pub tab: String,
}

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `Jan 25` through `Dec 26`.
pub fn default_tab_table() -> Vec<TabRoute> {
    [2025, 2026]
        .into_iter()
        .flat_map(|year| {
            MONTH_ABBREVIATIONS
                .iter()
                .enumerate()
                .map(move |(index, abbreviation)| TabRoute {
                    year,
                    month: index as u32 + 1,
                    tab: format!("{abbreviation} {:02}", year % 100),
                })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    /// Tab name from the routing table.
    pub tab_name: String,
    /// The worksheet name as it appears in the workbook.
    pub sheet_name: String,
    pub parsed_date: Option<NaiveDate>,
    pub warnings: Warnings,
}

#[derive(Debug, Clone, Copy)]
pub struct DateTabRouter<'a> {
    tabs: &'a [TabRoute],
    default_tab: &'a str,
}

impl<'a> DateTabRouter<'a> {
    pub fn new(tabs: &'a [TabRoute], default_tab: &'a str) -> Self {
        Self { tabs, default_tab }
    }

    pub fn tab_for(&self, date: NaiveDate) -> Option<&'a str> {
        self.tabs
            .iter()
            .find(|route| route.year == date.year() && route.month == date.month())
            .map(|route| route.tab.as_str())
    }

    pub fn route(&self, book: &Spreadsheet, raw: &CellValue) -> ReportResult<RouteResult> {
        self.route_on(book, raw, Local::now().date_naive())
    }

    /// Routes `raw`, using `today` when the value is empty.
    pub fn route_on(
        &self,
        book: &Spreadsheet,
        raw: &CellValue,
        today: NaiveDate,
    ) -> ReportResult<RouteResult> {
        let mut warnings = Warnings::new();
        let parsed_date = if raw.is_empty() {
            Some(today)
        } else {
            parse_date_value(raw)
        };

        let tab_name = match parsed_date {
            Some(date) => match self.tab_for(date) {
                Some(tab) => tab.to_string(),
                None => {
                    warnings.push(ReportWarning::TabFallback {
                        detail: format!(
                            "{} has no monthly tab, using '{}'",
                            date.format("%Y-%m"),
                            self.default_tab
                        ),
                    });
                    self.default_tab.to_string()
                }
            },
            None => {
                warnings.push(ReportWarning::TabFallback {
                    detail: format!(
                        "could not parse report date {:?}, using '{}'",
                        raw.as_text(),
                        self.default_tab
                    ),
                });
                self.default_tab.to_string()
            }
        };

        let sheet_name = find_sheet_name(book, &tab_name).ok_or_else(|| {
            ReportError::structure("", format!("workbook has no worksheet named '{tab_name}'"))
        })?;

        tracing::debug!(tab = tab_name.as_str(), sheet = sheet_name.as_str(), "routed report date");
        Ok(RouteResult {
            tab_name,
            sheet_name,
            parsed_date,
            warnings,
        })
    }

    /// Table tabs the workbook does not contain. Advisory only.
    pub fn validate_template(&self, book: &Spreadsheet) -> Vec<String> {
        self.tabs
            .iter()
            .map(|route| route.tab.as_str())
            .chain(std::iter::once(self.default_tab))
            .filter(|tab| find_sheet_name(book, tab).is_none())
            .fold(Vec::new(), |mut missing, tab| {
                if !missing.iter().any(|seen: &String| seen == tab) {
                    missing.push(tab.to_string());
                }
                missing
            })
    }
}

/// Exact worksheet name first, then a case-insensitive match.
pub fn find_sheet_name(book: &Spreadsheet, name: &str) -> Option<String> {
    let sheets = book.get_sheet_collection();
    sheets
        .iter()
        .find(|sheet| sheet.get_name() == name)
        .or_else(|| {
            sheets
                .iter()
                .find(|sheet| sheet.get_name().eq_ignore_ascii_case(name))
        })
        .map(|sheet| sheet.get_name().to_string())
}
