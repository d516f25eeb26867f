use super::tokens::{Token, TokenVocabulary};
use super::{ColumnSpan, MergeRegion, RowRange, sheet_merges};
use crate::config::CellRef;
use crate::error::{ReportError, ReportResult};
use std::collections::{BTreeMap, BTreeSet};
use umya_spreadsheet::{Style, Worksheet};

/// One cell of the captured block, addressed relative to the section's first row.
#[derive(Debug, Clone)]
pub struct CapturedCell {
    pub row_offset: u32,
    pub col: u32,
    pub value: String,
    /// Formula body without the leading `=`.
    pub formula: Option<String>,
    pub style: Style,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowHeight {
    pub height: f64,
    pub custom: bool,
}

/// An immutable snapshot of the repeating block of a template worksheet.
///
/// Captured once per request before any rows move, so every replica is
/// stamped from the same pristine content.
#[derive(Debug, Clone)]
pub struct TemplateSection {
    pub rows: RowRange,
    pub columns: ColumnSpan,
    pub cells: Vec<CapturedCell>,
    /// Merges fully inside the block, in the block's original coordinates.
    pub merges: Vec<MergeRegion>,
    pub row_heights: Vec<Option<RowHeight>>,
}

impl TemplateSection {
    pub fn capture(sheet: &Worksheet, rows: RowRange, columns: ColumnSpan) -> ReportResult<Self> {
        if rows.start == 0 || columns.first == 0 {
            return Err(ReportError::replication(format!(
                "section rows {rows} on sheet '{}' are not one-based",
                sheet.get_name()
            )));
        }

        let mut cells: Vec<CapturedCell> = sheet
            .get_cell_collection()
            .into_iter()
            .filter_map(|cell| {
                let coordinate = cell.get_coordinate();
                let col = coordinate.get_col_num().to_owned();
                let row = coordinate.get_row_num().to_owned();
                if !rows.contains(row) || !columns.contains(col) {
                    return None;
                }
                let formula = cell
                    .is_formula()
                    .then(|| cell.get_formula().trim_start_matches('=').to_string());
                Some(CapturedCell {
                    row_offset: row - rows.start,
                    col,
                    value: cell.get_value().to_string(),
                    formula,
                    style: cell.get_style().clone(),
                })
            })
            .collect();
        cells.sort_by_key(|cell| (cell.row_offset, cell.col));

        let merges = sheet_merges(sheet)
            .into_iter()
            .filter(|region| {
                region.within_rows(rows)
                    && columns.contains(region.left)
                    && columns.contains(region.right)
            })
            .collect();

        let row_heights = rows
            .iter()
            .map(|row| {
                sheet.get_row_dimension(&row).and_then(|dimension| {
                    let height: f64 = dimension.get_height().to_owned();
                    let custom: bool = dimension.get_custom_height().to_owned();
                    (height > 0.0).then_some(RowHeight { height, custom })
                })
            })
            .collect();

        Ok(Self {
            rows,
            columns,
            cells,
            merges,
            row_heights,
        })
    }

    pub fn height(&self) -> u32 {
        self.rows.height()
    }

    pub fn cell(&self, row_offset: u32, col: u32) -> Option<&CapturedCell> {
        self.cells
            .iter()
            .find(|cell| cell.row_offset == row_offset && cell.col == col)
    }

    /// Tokens present anywhere in the block's text.
    pub fn tokens(&self, vocabulary: &TokenVocabulary) -> BTreeSet<Token> {
        self.cells
            .iter()
            .filter(|cell| cell.formula.is_none())
            .flat_map(|cell| vocabulary.contained(&cell.value))
            .collect()
    }

    pub fn has_section_tokens(&self, vocabulary: &TokenVocabulary) -> bool {
        self.tokens(vocabulary)
            .into_iter()
            .any(Token::is_section_token)
    }

    /// Puts token literals back into a block that was captured from an
    /// already generated report, so it can serve as a template again.
    ///
    /// `token_cells` are relative to the block's top-left cell.
    pub fn retokenize(&mut self, token_cells: &BTreeMap<Token, CellRef>, vocabulary: &TokenVocabulary) {
        for (token, position) in token_cells {
            if position.row == 0 || position.col == 0 {
                continue;
            }
            let row_offset = position.row - 1;
            let col = self.columns.first + position.col - 1;
            if row_offset >= self.height() || !self.columns.contains(col) {
                continue;
            }
            let literal = vocabulary.literal(*token).to_string();
            match self
                .cells
                .iter_mut()
                .find(|cell| cell.row_offset == row_offset && cell.col == col)
            {
                Some(cell) => {
                    cell.value = literal;
                    cell.formula = None;
                }
                None => self.cells.push(CapturedCell {
                    row_offset,
                    col,
                    value: literal,
                    formula: None,
                    style: Style::default(),
                }),
            }
        }
        self.cells.sort_by_key(|cell| (cell.row_offset, cell.col));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eod_like_sheet(book: &mut umya_spreadsheet::Spreadsheet) -> &mut Worksheet {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A8").set_value("{{tour_name}}");
        sheet.get_cell_mut("B9").set_value("{{departure_time}}");
        sheet.get_cell_mut("C9").set_value("{{num_adult}}");
        sheet.get_cell_mut("F9").set_formula("C9+D9+E9");
        sheet.get_cell_mut("B10").set_value("{{notes}}");
        sheet.get_cell_mut("A12").set_value("outside");
        sheet.add_merge_cells("A8:H8");
        sheet.add_merge_cells("B10:H10");
        sheet.add_merge_cells("A12:B12");
        sheet.get_row_dimension_mut(&9).set_height(30.0);
        sheet
    }

    #[test]
    fn captures_cells_merges_and_heights_inside_the_block() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = eod_like_sheet(&mut book);
        let section =
            TemplateSection::capture(sheet, RowRange::new(8, 10), ColumnSpan::new(1, 8)).unwrap();

        assert_eq!(section.height(), 3);
        assert_eq!(section.cell(0, 1).unwrap().value, "{{tour_name}}");
        assert_eq!(section.cell(1, 6).unwrap().formula.as_deref(), Some("C9+D9+E9"));
        assert_eq!(section.merges.len(), 2);
        assert!(section.cells.iter().all(|cell| cell.row_offset < 3));
        assert_eq!(section.row_heights[1].map(|h| h.height), Some(30.0));

        let vocab = TokenVocabulary::standard();
        assert!(section.has_section_tokens(&vocab));
        assert!(section.tokens(&vocab).contains(&Token::Notes));
    }

    #[test]
    fn retokenize_restores_literals_over_rendered_values() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A8").set_value("Glacier Walk");
        sheet.get_cell_mut("C9").set_value_number(4);

        let vocab = TokenVocabulary::standard();
        let mut section =
            TemplateSection::capture(sheet, RowRange::new(8, 10), ColumnSpan::new(1, 8)).unwrap();
        assert!(!section.has_section_tokens(&vocab));

        let mut map = BTreeMap::new();
        map.insert(Token::TourName, CellRef::at("A1").unwrap());
        map.insert(Token::NumAdult, CellRef::at("C2").unwrap());
        map.insert(Token::Notes, CellRef::at("B3").unwrap());
        section.retokenize(&map, &vocab);

        assert_eq!(section.cell(0, 1).unwrap().value, "{{tour_name}}");
        assert_eq!(section.cell(1, 3).unwrap().value, "{{num_adult}}");
        assert_eq!(section.cell(2, 2).unwrap().value, "{{notes}}");
    }
}
