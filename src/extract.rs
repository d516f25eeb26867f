use crate::config::{CellRef, SourceLayout};
use crate::dates::{format_departure, normalize_header_date};
use crate::error::{ReportError, ReportResult, ReportWarning, Warnings};
use crate::model::{CellValue, ReportHeader, TourRecord};
use crate::store::ReportDocument;
use crate::utils::cell_address;
use umya_spreadsheet::Worksheet;

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<TourRecord>,
    pub header: ReportHeader,
    pub warnings: Warnings,
}

/// Reads tour rows and header metadata out of a dispatch workbook.
#[derive(Debug, Clone, Copy)]
pub struct RecordExtractor<'a> {
    layout: &'a SourceLayout,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(layout: &'a SourceLayout) -> Self {
        Self { layout }
    }

    pub fn extract(&self, document: &ReportDocument) -> ReportResult<Extraction> {
        let layout = self.layout;
        let sheet = document.book.get_sheet(&layout.sheet_index).ok_or_else(|| {
            ReportError::structure(
                &document.path,
                format!("dispatch worksheet #{} is missing", layout.sheet_index),
            )
        })?;

        let mut warnings = Warnings::new();
        let last_row = layout.last_row.min(sheet.get_highest_row());
        let name_col = layout.name_column.index();
        let mut records = Vec::new();

        for row in layout.first_row..=last_row {
            let name = match CellValue::from_cell(sheet.get_cell((name_col, row))) {
                CellValue::Text(text) if !text.trim().is_empty() => text.trim().to_string(),
                _ => continue,
            };
            if self.is_header_label(&name) {
                continue;
            }

            let value_at = |offset: u32| CellValue::from_cell(sheet.get_cell((name_col + offset, row)));
            let mut count_at = |offset: u32, field: &str| {
                let value = value_at(offset);
                match value.as_count() {
                    Some(count) => count,
                    None => {
                        if !value.is_empty() {
                            warnings.push(ReportWarning::Parse {
                                location: cell_address(name_col + offset, row),
                                detail: format!("{field} {:?} is not a count, using 0", value.as_text()),
                            });
                        }
                        0
                    }
                }
            };

            let adult_count = count_at(layout.adult_offset, "adult count");
            let child_count = count_at(layout.child_offset, "child count");
            let comp_count = count_at(layout.comp_offset, "comp count");
            records.push(TourRecord {
                name,
                departure_time: format_departure(&value_at(layout.departure_offset)),
                notes: value_at(layout.notes_offset).as_text(),
                adult_count,
                child_count,
                comp_count,
            });
        }

        let header = self.read_header(sheet);
        tracing::debug!(
            path = %document.path.display(),
            records = records.len(),
            warnings = warnings.len(),
            "extracted dispatch records"
        );
        Ok(Extraction {
            records,
            header,
            warnings,
        })
    }

    fn is_header_label(&self, name: &str) -> bool {
        self.layout
            .header_labels
            .iter()
            .any(|label| label.trim().eq_ignore_ascii_case(name))
    }

    fn read_header(&self, sheet: &Worksheet) -> ReportHeader {
        let cells = &self.layout.header;
        let read = |field: &str, cell: Option<CellRef>| -> CellValue {
            let value = cell
                .map(|cell| CellValue::from_cell(sheet.get_cell((cell.col, cell.row))))
                .unwrap_or_default();
            if value.is_empty() {
                tracing::debug!(field, "dispatch header field is empty");
            }
            value
        };
        let text = |field: &str, cell: Option<CellRef>| read(field, cell).as_text();

        ReportHeader {
            country: text("country", cells.country),
            cruise_line: text("cruise_line", cells.cruise_line),
            ship_name: text("ship_name", cells.ship_name),
            port: text("port", cells.port),
            report_date: normalize_header_date(&read("report_date", cells.report_date)),
            tour_operator: text("tour_operator", cells.tour_operator),
            shorex_manager: text("shorex_manager", cells.shorex_manager),
            assistant_manager: text("assistant_manager", cells.assistant_manager),
        }
    }
}

/// Folds records that share a tour name into the first occurrence.
///
/// Counts are summed; distinct non-empty notes are joined with `"; "`.
pub fn merge_by_name(records: Vec<TourRecord>) -> Vec<TourRecord> {
    let mut merged: Vec<TourRecord> = Vec::with_capacity(records.len());
    for record in records {
        match merged
            .iter_mut()
            .find(|existing| existing.name.eq_ignore_ascii_case(&record.name))
        {
            Some(existing) => {
                existing.adult_count += record.adult_count;
                existing.child_count += record.child_count;
                existing.comp_count += record.comp_count;
                if existing.departure_time.is_empty() {
                    existing.departure_time = record.departure_time;
                }
                let notes = record.notes.trim();
                if !notes.is_empty() && !existing.notes.split("; ").any(|seen| seen == notes) {
                    if existing.notes.is_empty() {
                        existing.notes = notes.to_string();
                    } else {
                        existing.notes = format!("{}; {notes}", existing.notes);
                    }
                }
            }
            None => merged.push(record),
        }
    }
    merged
}
