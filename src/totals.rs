//! Totals computation, rendering and discovery.
//!
//! A rendered totals row is tagged with a worksheet-scoped defined name so the
//! next append finds it without guessing. Documents produced before the marker
//! existed fall back to the leftover `{{total_adult}}` token, then to a
//! structural scan, then to the configured row.

use crate::config::TotalsLayout;
use crate::error::{ReportError, ReportResult, ReportWarning, Warnings};
use crate::model::{CellValue, TotalsAccumulator, TourRecord};
use crate::template::tokens::{Token, TokenVocabulary};
use crate::utils::{
    absolute_cell_address, column_number_to_name, parse_cell_address, quote_sheet_name,
    strip_sheet_prefix,
};
use umya_spreadsheet::{Spreadsheet, Worksheet};

/// Where the totals of one worksheet are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsBlock {
    pub row: u32,
    pub adult_col: u32,
    pub child_col: u32,
    pub comp_col: u32,
    pub formula_col: Option<u32>,
}

impl TotalsBlock {
    pub fn from_layout(layout: &TotalsLayout, row: u32) -> Self {
        Self {
            row,
            adult_col: layout.adult_column.index(),
            child_col: layout.child_column.index(),
            comp_col: layout.comp_column.index(),
            formula_col: layout.formula_column.map(|column| column.index()),
        }
    }

    pub fn at_row(self, row: u32) -> Self {
        Self { row, ..self }
    }

    pub fn count_columns(&self) -> [u32; 3] {
        [self.adult_col, self.child_col, self.comp_col]
    }

    /// `SUM(C12:E12)` over the count cells of the current row.
    pub fn sum_formula(&self) -> String {
        let columns = self.count_columns();
        let first = columns.iter().copied().min().unwrap_or(self.adult_col);
        let last = columns.iter().copied().max().unwrap_or(self.comp_col);
        format!(
            "SUM({}{row}:{}{row})",
            column_number_to_name(first),
            column_number_to_name(last),
            row = self.row
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsSource {
    Marker,
    Token,
    Heuristic,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsLocation {
    pub block: TotalsBlock,
    pub source: TotalsSource,
}

#[derive(Debug, Clone, Copy)]
pub struct TotalsAggregator<'a> {
    layout: &'a TotalsLayout,
    vocabulary: &'a TokenVocabulary,
}

impl<'a> TotalsAggregator<'a> {
    pub fn new(layout: &'a TotalsLayout, vocabulary: &'a TokenVocabulary) -> Self {
        Self { layout, vocabulary }
    }

    pub fn fresh(records: &[TourRecord]) -> TotalsAccumulator {
        records.iter().fold(TotalsAccumulator::default(), |mut acc, record| {
            acc.add_record(record);
            acc
        })
    }

    /// Existing totals plus the new records only.
    pub fn appended(existing: TotalsAccumulator, new_records: &[TourRecord]) -> TotalsAccumulator {
        existing + Self::fresh(new_records)
    }

    pub fn read_existing(&self, sheet: &Worksheet, block: &TotalsBlock) -> TotalsAccumulator {
        let read = |col: u32| {
            u64::from(CellValue::from_cell(sheet.get_cell((col, block.row))).coerce_count())
        };
        TotalsAccumulator::new(read(block.adult_col), read(block.child_col), read(block.comp_col))
    }

    pub fn render(&self, sheet: &mut Worksheet, totals: &TotalsAccumulator, block: &TotalsBlock) {
        for (col, value) in [
            (block.adult_col, totals.adults),
            (block.child_col, totals.children),
            (block.comp_col, totals.comp),
        ] {
            let cell = sheet.get_cell_mut((col, block.row));
            cell.get_cell_value_mut().remove_formula();
            cell.set_value_number(value as f64);
        }
        if let Some(col) = block.formula_col {
            sheet
                .get_cell_mut((col, block.row))
                .set_formula(block.sum_formula())
                .set_formula_result_default(totals.grand_total().to_string());
        }
        tracing::debug!(
            sheet = sheet.get_name(),
            row = block.row,
            adults = totals.adults,
            children = totals.children,
            comp = totals.comp,
            "rendered totals"
        );
    }

    /// Totals block of a pristine template: the `{{total_adult}}` token, or
    /// the configured fallback row. Must sit below `section_end`.
    pub fn locate_in_template(
        &self,
        sheet: &Worksheet,
        section_end: u32,
        warnings: &mut Warnings,
    ) -> ReportResult<TotalsBlock> {
        let block = match self.find_token_block(sheet, section_end) {
            Some(block) => block,
            None => {
                warnings.push(ReportWarning::TotalsLocation {
                    detail: format!(
                        "no {} token on '{}', using row {}",
                        self.vocabulary.literal(Token::TotalAdult),
                        sheet.get_name(),
                        self.layout.fallback_row
                    ),
                });
                TotalsBlock::from_layout(self.layout, self.layout.fallback_row)
            }
        };
        if block.row <= section_end {
            return Err(ReportError::structure(
                "",
                format!(
                    "totals row {} on '{}' is not below the section ending at row {section_end}",
                    block.row,
                    sheet.get_name()
                ),
            ));
        }
        Ok(block)
    }

    /// Totals block of an already generated worksheet.
    ///
    /// `row_width` bounds the columns checked when deciding whether a row is empty.
    pub fn locate_existing(
        &self,
        book: &Spreadsheet,
        sheet_name: &str,
        section_end: u32,
        row_width: u32,
        warnings: &mut Warnings,
    ) -> ReportResult<TotalsLocation> {
        let sheet = book.get_sheet_by_name(sheet_name).ok_or_else(|| {
            ReportError::structure("", format!("worksheet '{sheet_name}' not found"))
        })?;

        if let Some(row) = read_totals_marker(book, sheet_name, &self.layout.marker_prefix) {
            return Ok(TotalsLocation {
                block: TotalsBlock::from_layout(self.layout, row),
                source: TotalsSource::Marker,
            });
        }
        if let Some(block) = self.find_token_block(sheet, section_end) {
            return Ok(TotalsLocation {
                block,
                source: TotalsSource::Token,
            });
        }

        let candidates = self.heuristic_rows(sheet, row_width);
        if let Some(&row) = candidates.last() {
            let detail = if candidates.len() > 1 {
                format!(
                    "no totals marker on '{sheet_name}'; {} rows look like totals, using the bottom-most (row {row})",
                    candidates.len()
                )
            } else {
                format!("no totals marker on '{sheet_name}'; located totals at row {row} by layout")
            };
            warnings.push(ReportWarning::TotalsLocation { detail });
            return Ok(TotalsLocation {
                block: TotalsBlock::from_layout(self.layout, row),
                source: TotalsSource::Heuristic,
            });
        }

        warnings.push(ReportWarning::TotalsLocation {
            detail: format!(
                "could not locate totals on '{sheet_name}', using row {}",
                self.layout.fallback_row
            ),
        });
        Ok(TotalsLocation {
            block: TotalsBlock::from_layout(self.layout, self.layout.fallback_row),
            source: TotalsSource::Fallback,
        })
    }

    fn find_token_block(&self, sheet: &Worksheet, below: u32) -> Option<TotalsBlock> {
        let position = |token: Token, row: Option<u32>| -> Option<(u32, u32)> {
            let literal = self.vocabulary.literal(token);
            sheet
                .get_cell_collection()
                .into_iter()
                .filter(|cell| !cell.is_formula() && cell.get_value().contains(literal))
                .map(|cell| {
                    let coordinate = cell.get_coordinate();
                    (
                        coordinate.get_col_num().to_owned(),
                        coordinate.get_row_num().to_owned(),
                    )
                })
                .filter(|(_, r)| *r > below && row.is_none_or(|wanted| wanted == *r))
                .min_by_key(|(c, r)| (*r, *c))
        };

        let (adult_col, row) = position(Token::TotalAdult, None)?;
        let fallback = TotalsBlock::from_layout(self.layout, row);
        Some(TotalsBlock {
            row,
            adult_col,
            child_col: position(Token::TotalChd, Some(row))
                .map(|(col, _)| col)
                .unwrap_or(fallback.child_col),
            comp_col: position(Token::TotalComp, Some(row))
                .map(|(col, _)| col)
                .unwrap_or(fallback.comp_col),
            formula_col: fallback.formula_col,
        })
    }

    fn heuristic_rows(&self, sheet: &Worksheet, row_width: u32) -> Vec<u32> {
        let highest = sheet.get_highest_row();
        let block = TotalsBlock::from_layout(self.layout, 0);
        let width = row_width.max(block.count_columns().into_iter().max().unwrap_or(1));
        let row_is_empty = |row: u32| {
            (1..=width).all(|col| CellValue::from_cell(sheet.get_cell((col, row))).is_empty())
        };

        (self.layout.min_row..=highest)
            .filter(|row| {
                block
                    .count_columns()
                    .iter()
                    .all(|col| CellValue::from_cell(sheet.get_cell((*col, *row))).is_numeric())
            })
            .filter(|row| (1..=self.layout.empty_rows_after).all(|offset| row_is_empty(row + offset)))
            .collect()
    }
}

/// Defined name tagging the totals row of `sheet_name`.
pub fn marker_name(prefix: &str, sheet_name: &str) -> String {
    let suffix: String = sheet_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{prefix}_{suffix}")
}

pub fn read_totals_marker(book: &Spreadsheet, sheet_name: &str, prefix: &str) -> Option<u32> {
    let name = marker_name(prefix, sheet_name);
    let sheet_level = book
        .get_sheet_by_name(sheet_name)
        .map(|sheet| sheet.get_defined_names().iter().collect::<Vec<_>>())
        .unwrap_or_default();

    sheet_level
        .into_iter()
        .chain(book.get_defined_names().iter())
        .filter(|defined| defined.get_name().eq_ignore_ascii_case(&name))
        .find_map(|defined| {
            let address = defined.get_address();
            let (sheet, coordinate) = strip_sheet_prefix(&address);
            if sheet.is_some_and(|sheet| !sheet.eq_ignore_ascii_case(sheet_name)) {
                return None;
            }
            parse_cell_address(coordinate).map(|(_, row)| row)
        })
}

/// Points the marker at `block`, replacing any earlier one at either scope.
pub fn write_totals_marker(
    book: &mut Spreadsheet,
    sheet_name: &str,
    prefix: &str,
    block: &TotalsBlock,
) -> ReportResult<()> {
    let name = marker_name(prefix, sheet_name);
    book.get_defined_names_mut()
        .retain(|defined| !defined.get_name().eq_ignore_ascii_case(&name));

    let sheet = book.get_sheet_by_name_mut(sheet_name).ok_or_else(|| {
        ReportError::structure("", format!("worksheet '{sheet_name}' not found"))
    })?;
    sheet
        .get_defined_names_mut()
        .retain(|defined| !defined.get_name().eq_ignore_ascii_case(&name));

    let address = format!(
        "{}!{}",
        quote_sheet_name(sheet_name),
        absolute_cell_address(block.adult_col, block.row)
    );
    sheet
        .add_defined_name(name.as_str(), address.as_str())
        .map_err(|err| ReportError::structure("", format!("cannot set totals marker {name}: {err}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn eod_layout() -> TotalsLayout {
        EngineConfig::default().eod.totals
    }

    #[test]
    fn fresh_and_appended_sums() {
        let records = vec![
            TourRecord::new("A").with_counts(2, 1, 0),
            TourRecord::new("B"),
            TourRecord::new("C").with_counts(5, 0, 0),
        ];
        let fresh = TotalsAggregator::fresh(&records);
        assert_eq!(fresh, TotalsAccumulator::new(7, 1, 0));
        let appended =
            TotalsAggregator::appended(fresh, &[TourRecord::new("D").with_counts(1, 1, 1)]);
        assert_eq!(appended, TotalsAccumulator::new(8, 2, 1));
    }

    #[test]
    fn renders_counts_and_repoints_the_sum() {
        let layout = eod_layout();
        let vocab = TokenVocabulary::standard();
        let aggregator = TotalsAggregator::new(&layout, &vocab);
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        let block = TotalsBlock::from_layout(&layout, 20);

        aggregator.render(sheet, &TotalsAccumulator::new(7, 1, 2), &block);

        assert_eq!(aggregator.read_existing(sheet, &block), TotalsAccumulator::new(7, 1, 2));
        let formula = sheet.get_cell("F20").unwrap();
        assert!(formula.is_formula());
        assert_eq!(formula.get_formula(), "SUM(C20:E20)");
    }

    #[test]
    fn template_totals_come_from_the_token_row() {
        let layout = eod_layout();
        let vocab = TokenVocabulary::standard();
        let aggregator = TotalsAggregator::new(&layout, &vocab);
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("C13").set_value("{{total_adult}}");
        sheet.get_cell_mut("D13").set_value("{{total_chd}}");
        sheet.get_cell_mut("G13").set_value("{{total_comp}}");

        let mut warnings = Warnings::new();
        let block = aggregator.locate_in_template(sheet, 10, &mut warnings).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(block.row, 13);
        assert_eq!(block.count_columns(), [3, 4, 7]);
    }

    #[test]
    fn template_without_token_uses_the_fallback_row() {
        let layout = eod_layout();
        let vocab = TokenVocabulary::standard();
        let aggregator = TotalsAggregator::new(&layout, &vocab);
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        let mut warnings = Warnings::new();
        let block = aggregator.locate_in_template(sheet, 10, &mut warnings).unwrap();
        assert_eq!(block.row, 12);
        assert_eq!(warnings.len(), 1);

        let err = aggregator.locate_in_template(sheet, 12, &mut warnings).unwrap_err();
        assert!(matches!(err, ReportError::DocumentStructure { .. }));
    }

    #[test]
    fn marker_wins_over_heuristics() {
        let layout = eod_layout();
        let vocab = TokenVocabulary::standard();
        let aggregator = TotalsAggregator::new(&layout, &vocab);
        let mut book = umya_spreadsheet::new_file();
        let block = TotalsBlock::from_layout(&layout, 24);
        write_totals_marker(&mut book, "Sheet1", &layout.marker_prefix, &block).unwrap();
        // Rewriting moves the marker rather than adding a second one.
        write_totals_marker(&mut book, "Sheet1", &layout.marker_prefix, &block.at_row(28)).unwrap();

        let mut warnings = Warnings::new();
        let location = aggregator
            .locate_existing(&book, "Sheet1", 10, 8, &mut warnings)
            .unwrap();
        assert_eq!(location.source, TotalsSource::Marker);
        assert_eq!(location.block.row, 28);
        assert!(warnings.is_empty());
    }

    #[test]
    fn heuristic_picks_the_bottom_most_candidate() {
        let layout = eod_layout();
        let vocab = TokenVocabulary::standard();
        let aggregator = TotalsAggregator::new(&layout, &vocab);
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        for (row, adults) in [(13, 2), (20, 9)] {
            sheet.get_cell_mut((3, row)).set_value_number(adults);
            sheet.get_cell_mut((4, row)).set_value_number(0);
            sheet.get_cell_mut((5, row)).set_value_number(1);
        }

        let mut warnings = Warnings::new();
        let location = aggregator
            .locate_existing(&book, "Sheet1", 10, 8, &mut warnings)
            .unwrap();
        assert_eq!(location.source, TotalsSource::Heuristic);
        assert_eq!(location.block.row, 20);
        assert_eq!(warnings.len(), 1);
        let sheet = book.get_sheet_by_name("Sheet1").unwrap();
        assert_eq!(
            aggregator.read_existing(sheet, &location.block),
            TotalsAccumulator::new(9, 0, 1)
        );
    }

    #[test]
    fn nothing_found_uses_the_fallback_row() {
        let layout = eod_layout();
        let vocab = TokenVocabulary::standard();
        let aggregator = TotalsAggregator::new(&layout, &vocab);
        let book = umya_spreadsheet::new_file();
        let mut warnings = Warnings::new();
        let location = aggregator
            .locate_existing(&book, "Sheet1", 10, 8, &mut warnings)
            .unwrap();
        assert_eq!(location.source, TotalsSource::Fallback);
        assert_eq!(location.block.row, 12);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn marker_names_are_sanitised() {
        assert_eq!(marker_name("DISPATCH_TOTALS", "Dec 25"), "DISPATCH_TOTALS_Dec_25");
    }
}
