use super::section::TemplateSection;
use super::{RowRange, add_merge_once};
use crate::error::{ReportError, ReportResult};
use crate::formula::shift_formula_rows;
use crate::styles::apply_boundary_border;
use umya_spreadsheet::Worksheet;

/// Where one stamped copy of the section landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicatedInstance {
    pub index: usize,
    pub rows: RowRange,
}

/// Stamps copies of a captured section into a worksheet.
///
/// Every copy occupies `height + 1` rows: the section itself followed by one
/// blank separator row.
#[derive(Debug, Clone, Copy)]
pub struct SectionReplicator<'a> {
    section: &'a TemplateSection,
    boundary_column: Option<u32>,
}

impl<'a> SectionReplicator<'a> {
    pub fn new(section: &'a TemplateSection, boundary_column: Option<u32>) -> Self {
        Self {
            section,
            boundary_column,
        }
    }

    pub fn stride(&self) -> u32 {
        self.section.height() + 1
    }

    /// Opens `count` strides of blank rows at `at_row`, pushing everything at
    /// and below it down, then stamps one copy into each stride.
    pub fn replicate(
        &self,
        sheet: &mut Worksheet,
        at_row: u32,
        count: usize,
    ) -> ReportResult<Vec<ReplicatedInstance>> {
        if self.section.height() == 0 {
            return Err(ReportError::replication("section has zero height"));
        }
        if at_row == 0 {
            return Err(ReportError::replication("rows are one-based"));
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let count_u32 = u32::try_from(count)
            .map_err(|_| ReportError::replication(format!("{count} sections is too many")))?;
        let inserted = self.stride() * count_u32;
        sheet.insert_new_row(&at_row, &inserted);
        tracing::debug!(
            sheet = sheet.get_name(),
            at_row,
            inserted,
            sections = count,
            "inserted section rows"
        );

        Ok((0..count)
            .map(|index| {
                let start = at_row + self.stride() * index as u32;
                self.stamp(sheet, index, start)
            })
            .collect())
    }

    /// Writes one copy with its first row at `target_row` into rows that are
    /// already blank.
    pub fn stamp(&self, sheet: &mut Worksheet, index: usize, target_row: u32) -> ReplicatedInstance {
        let section = self.section;
        let delta = i64::from(target_row) - i64::from(section.rows.start);

        for captured in &section.cells {
            let row = target_row + captured.row_offset;
            let cell = sheet.get_cell_mut((captured.col, row));
            cell.set_style(captured.style.clone());
            match &captured.formula {
                Some(formula) => {
                    let shifted = shift_formula_rows(formula, delta).unwrap_or_else(|err| {
                        tracing::warn!(
                            formula = formula.as_str(),
                            row,
                            error = %err,
                            "formula copied without row adjustment"
                        );
                        formula.clone()
                    });
                    cell.set_formula(shifted);
                }
                None if !captured.value.is_empty() => {
                    cell.set_value(captured.value.clone());
                }
                None => {}
            }
        }

        for (offset, height) in section.row_heights.iter().enumerate() {
            if let Some(height) = height {
                sheet
                    .get_row_dimension_mut(&(target_row + offset as u32))
                    .set_height(height.height)
                    .set_custom_height(height.custom);
            }
        }

        for merge in &section.merges {
            if let Some(region) = merge.shifted(delta) {
                add_merge_once(sheet, region);
            }
        }

        if let Some(col) = self.boundary_column {
            // Separator row included so the rule runs unbroken.
            for row in target_row..=target_row + section.height() {
                apply_boundary_border(sheet.get_cell_mut((col, row)).get_style_mut());
            }
        }

        ReplicatedInstance {
            index,
            rows: RowRange::new(target_row, target_row + section.height() - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::has_boundary_border;
    use crate::template::{ColumnSpan, cell_text, sheet_merges};

    #[test]
    fn stamps_each_copy_one_stride_apart() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A8").set_value("{{tour_name}}");
        sheet.get_cell_mut("C9").set_value("{{num_adult}}");
        sheet.get_cell_mut("F9").set_formula("C9+D9");
        sheet.add_merge_cells("A8:H8");
        sheet.get_cell_mut("A12").set_value("TOTAL");

        let section =
            TemplateSection::capture(sheet, RowRange::new(8, 10), ColumnSpan::new(1, 8)).unwrap();
        let replicator = SectionReplicator::new(&section, Some(8));
        let instances = replicator.replicate(sheet, 8, 2).unwrap();

        assert_eq!(instances[0].rows, RowRange::new(8, 10));
        assert_eq!(instances[1].rows, RowRange::new(12, 14));
        assert_eq!(cell_text(sheet, "A12"), "{{tour_name}}");
        assert_eq!(sheet.get_cell("F13").unwrap().get_formula(), "C13 + D13");
        // The original block and everything below moved down by two strides.
        assert_eq!(cell_text(sheet, "A16"), "{{tour_name}}");
        assert_eq!(cell_text(sheet, "A20"), "TOTAL");

        let merges = sheet_merges(sheet);
        assert!(merges.iter().any(|m| m.to_range() == "A12:H12"));
        assert!(has_boundary_border(sheet.get_cell("H11").unwrap().get_style()));
    }

    #[test]
    fn zero_copies_leave_the_sheet_alone() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A4").set_value("{{tour_name}}");
        let section =
            TemplateSection::capture(sheet, RowRange::new(4, 4), ColumnSpan::new(1, 7)).unwrap();
        let instances = SectionReplicator::new(&section, None)
            .replicate(sheet, 4, 0)
            .unwrap();
        assert!(instances.is_empty());
        assert_eq!(cell_text(sheet, "A4"), "{{tour_name}}");
    }
}
