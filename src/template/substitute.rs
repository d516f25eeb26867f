use super::tokens::{Token, TokenValue, TokenVocabulary};
use super::{ColumnSpan, MergeRegion, RowRange, add_merge_once, sheet_merges};
use crate::error::{ReportWarning, Warnings};
use crate::model::{TotalsAccumulator, TourRecord};
use crate::styles::{align_notes, align_title};
use std::collections::BTreeSet;
use umya_spreadsheet::Worksheet;

#[derive(Debug, Default)]
pub struct SubstitutionOutcome {
    pub replaced: BTreeSet<Token>,
    pub warnings: Warnings,
}

/// Replaces token markers in stamped sections with record values.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderSubstitutionEngine<'a> {
    vocabulary: &'a TokenVocabulary,
    notes_merge_to: Option<u32>,
}

enum Rewrite {
    Number(u64),
    Text(String),
    Clear,
}

impl<'a> PlaceholderSubstitutionEngine<'a> {
    pub fn new(vocabulary: &'a TokenVocabulary, notes_merge_to: Option<u32>) -> Self {
        Self {
            vocabulary,
            notes_merge_to,
        }
    }

    pub fn substitute(
        &self,
        sheet: &mut Worksheet,
        rows: RowRange,
        columns: ColumnSpan,
        record: &TourRecord,
    ) -> SubstitutionOutcome {
        let mut outcome = SubstitutionOutcome::default();
        let merges: Vec<MergeRegion> = sheet_merges(sheet)
            .into_iter()
            .filter(|region| region.within_rows(rows))
            .collect();

        for row in rows.iter() {
            for col in columns.iter() {
                let Some(cell) = sheet.get_cell((col, row)) else {
                    continue;
                };
                if cell.is_formula() {
                    continue;
                }
                let text = cell.get_value().to_string();
                let tokens: Vec<Token> = self
                    .vocabulary
                    .contained(&text)
                    .into_iter()
                    .filter(|token| token.is_section_token())
                    .collect();
                if tokens.is_empty() {
                    continue;
                }

                let covered_elsewhere = merges
                    .iter()
                    .any(|region| region.covers(col, row) && region.anchor() != (col, row));
                let rewrite = if covered_elsewhere {
                    Rewrite::Clear
                } else {
                    self.rewrite(&text, &tokens, record)
                };

                let cell = sheet.get_cell_mut((col, row));
                match rewrite {
                    Rewrite::Clear => {
                        cell.set_value(String::new());
                        continue;
                    }
                    Rewrite::Number(count) => {
                        cell.set_value_number(count as f64);
                    }
                    Rewrite::Text(value) => {
                        cell.set_value(value);
                    }
                }
                if tokens.contains(&Token::TourName) {
                    align_title(cell.get_style_mut());
                }
                if tokens.contains(&Token::Notes) {
                    align_notes(cell.get_style_mut());
                }
                outcome.replaced.extend(tokens);
            }
        }

        if !outcome.replaced.contains(&Token::Notes) {
            let found = self.notes_fallback(sheet, &record.notes);
            if found > 0 {
                outcome.replaced.insert(Token::Notes);
            }
        }

        for required in [Token::TourName, Token::Notes] {
            if !outcome.replaced.contains(&required) {
                outcome.warnings.push(ReportWarning::MissingToken {
                    token: self.vocabulary.literal(required).to_string(),
                    rows: rows.to_string(),
                });
            }
        }
        tracing::debug!(
            tour = record.name.as_str(),
            rows = %rows,
            replaced = outcome.replaced.len(),
            "substituted section"
        );
        outcome
    }

    fn rewrite(&self, text: &str, tokens: &[Token], record: &TourRecord) -> Rewrite {
        if let Some(token) = self.vocabulary.exact(text).filter(|token| token.is_count()) {
            if let Some(TokenValue::Count(count)) = self.vocabulary.record_value(token, record) {
                return Rewrite::Number(count);
            }
        }
        let mut rendered = text.to_string();
        for token in tokens {
            if let Some(value) = self.vocabulary.record_value(*token, record) {
                rendered = self.vocabulary.replace(&rendered, *token, &value);
            }
        }
        Rewrite::Text(rendered)
    }

    /// Scans the whole worksheet for `{{notes}}` left outside any section.
    ///
    /// Each hit is replaced and, when a merge column is configured, merged
    /// across to it unless a merge already covers the cell.
    pub fn notes_fallback(&self, sheet: &mut Worksheet, notes: &str) -> usize {
        let literal = self.vocabulary.literal(Token::Notes);
        let hits: Vec<(u32, u32, String)> = sheet
            .get_cell_collection()
            .into_iter()
            .filter(|cell| !cell.is_formula())
            .filter_map(|cell| {
                let value = cell.get_value();
                value.contains(literal).then(|| {
                    let coordinate = cell.get_coordinate();
                    (
                        coordinate.get_col_num().to_owned(),
                        coordinate.get_row_num().to_owned(),
                        value.replace(literal, notes),
                    )
                })
            })
            .collect();

        for (col, row, value) in &hits {
            let cell = sheet.get_cell_mut((*col, *row));
            cell.set_value(value.clone());
            align_notes(cell.get_style_mut());

            if let Some(merge_to) = self.notes_merge_to.filter(|last| last > col) {
                let covered = sheet_merges(sheet)
                    .iter()
                    .any(|region| region.covers(*col, *row));
                if !covered {
                    add_merge_once(
                        sheet,
                        MergeRegion {
                            top: *row,
                            left: *col,
                            bottom: *row,
                            right: merge_to,
                        },
                    );
                }
            }
        }
        if !hits.is_empty() {
            tracing::debug!(cells = hits.len(), "notes placed by worksheet scan");
        }
        hits.len()
    }

    /// Replaces `{{total_*}}` markers anywhere on the sheet.
    pub fn substitute_totals(&self, sheet: &mut Worksheet, totals: &TotalsAccumulator) -> usize {
        let hits: Vec<(u32, u32, Rewrite)> = sheet
            .get_cell_collection()
            .into_iter()
            .filter(|cell| !cell.is_formula())
            .filter_map(|cell| {
                let value = cell.get_value();
                let tokens: Vec<Token> = self
                    .vocabulary
                    .contained(&value)
                    .into_iter()
                    .filter(|token| token.is_total())
                    .collect();
                if tokens.is_empty() {
                    return None;
                }
                let rewrite = match self.vocabulary.exact(&value) {
                    Some(token) if token.is_total() => self
                        .vocabulary
                        .totals_value(token, totals)
                        .and_then(|value| match value {
                            TokenValue::Count(count) => Some(Rewrite::Number(count)),
                            TokenValue::Text(_) => None,
                        })
                        .unwrap_or(Rewrite::Clear),
                    _ => {
                        let mut rendered = value.to_string();
                        for token in &tokens {
                            if let Some(value) = self.vocabulary.totals_value(*token, totals) {
                                rendered = self.vocabulary.replace(&rendered, *token, &value);
                            }
                        }
                        Rewrite::Text(rendered)
                    }
                };
                let coordinate = cell.get_coordinate();
                Some((
                    coordinate.get_col_num().to_owned(),
                    coordinate.get_row_num().to_owned(),
                    rewrite,
                ))
            })
            .collect();

        let count = hits.len();
        for (col, row, rewrite) in hits {
            let cell = sheet.get_cell_mut((col, row));
            match rewrite {
                Rewrite::Number(value) => {
                    cell.set_value_number(value as f64);
                }
                Rewrite::Text(value) => {
                    cell.set_value(value);
                }
                Rewrite::Clear => {
                    cell.set_value(String::new());
                }
            }
        }
        count
    }
}
