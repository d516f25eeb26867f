//! Appending new tour sections to an already generated report.

use crate::config::{SectionLayout, TotalsLayout};
use crate::error::{ReportError, ReportResult, Warnings};
use crate::model::{GenerationMode, TotalsAccumulator, TourRecord};
use crate::render::{RenderOutcome, SheetRender, resolve_sheet_name};
use crate::report::{GenerationStage, StageTracker};
use crate::store::WorkbookStore;
use crate::template::{SectionReplicator, TokenVocabulary};
use crate::totals::TotalsAggregator;
use std::path::Path;
use umya_spreadsheet::Spreadsheet;

#[derive(Debug, Clone, Default)]
pub struct AppendOutcome {
    pub records_added: usize,
    pub totals_after: TotalsAccumulator,
    pub warnings: Warnings,
}

#[derive(Debug, Clone, Copy)]
pub struct SuccessiveAppendController<'a> {
    section: &'a SectionLayout,
    totals: &'a TotalsLayout,
    vocabulary: &'a TokenVocabulary,
}

impl<'a> SuccessiveAppendController<'a> {
    pub fn new(
        section: &'a SectionLayout,
        totals: &'a TotalsLayout,
        vocabulary: &'a TokenVocabulary,
    ) -> Self {
        Self {
            section,
            totals,
            vocabulary,
        }
    }

    fn render_for<'s>(&self, sheet_name: &'s str, section_date: Option<&'s str>) -> SheetRender<'s>
    where
        'a: 's,
    {
        SheetRender {
            sheet_name,
            section: self.section,
            totals: self.totals,
            vocabulary: self.vocabulary,
            section_date,
        }
    }

    /// Loads `existing_path`, appends `records` to its report sheet and writes
    /// the result to `output_path`.
    pub fn append(
        &self,
        store: &dyn WorkbookStore,
        existing_path: &Path,
        records: &[TourRecord],
        output_path: &Path,
    ) -> ReportResult<AppendOutcome> {
        let mut stages = StageTracker::new();
        let mut document = store.load(existing_path)?;
        stages.advance(GenerationStage::DocumentLoaded)?;

        let sheet_name = resolve_sheet_name(&document.book, self.section)?;
        let (_, outcome) = self
            .append_to_sheet(&mut document.book, &sheet_name, None, records, &mut stages)
            .map_err(|err| err.with_path(existing_path))?;

        store.persist(&document, output_path)?;
        stages.advance(GenerationStage::Persisted)?;
        Ok(AppendOutcome {
            records_added: outcome.instances.len(),
            totals_after: outcome.totals,
            warnings: outcome.warnings,
        })
    }

    /// Appends to one worksheet in memory. A worksheet that still holds its
    /// template tokens is rendered fresh instead.
    pub fn append_to_sheet(
        &self,
        book: &mut Spreadsheet,
        sheet_name: &str,
        section_date: Option<&str>,
        records: &[TourRecord],
        stages: &mut StageTracker,
    ) -> ReportResult<(GenerationMode, RenderOutcome)> {
        let render = self.render_for(sheet_name, section_date);
        if render.is_pristine(book)? {
            tracing::debug!(sheet = sheet_name, "worksheet is still a template, rendering fresh");
            let outcome = render.render_fresh(book, records, stages)?;
            return Ok((GenerationMode::Fresh, outcome));
        }

        let mut warnings = Warnings::new();
        let aggregator: TotalsAggregator<'_> = render.aggregator();
        let layout = self.section;
        let location = aggregator.locate_existing(
            book,
            sheet_name,
            layout.end_row,
            layout.last_column.index(),
            &mut warnings,
        )?;
        let totals_row = location.block.row;
        if totals_row <= layout.end_row {
            return Err(ReportError::replication(format!(
                "worksheet '{sheet_name}' has no section above its totals row {totals_row} to reuse"
            )));
        }

        let mut section = render.capture(book)?;
        section.retokenize(&layout.token_cells, self.vocabulary);

        let sheet = render.sheet_mut(book)?;
        let existing = aggregator.read_existing(sheet, &location.block);

        let replicator = SectionReplicator::new(&section, render.boundary_column());
        let instances = replicator.replicate(sheet, totals_row, records.len())?;
        let inserted = replicator.stride() * instances.len() as u32;
        stages.advance(GenerationStage::SectionsInserted)?;

        render.substitute_all(sheet, &instances, records, &mut warnings);
        stages.advance(GenerationStage::PlaceholdersSubstituted)?;

        let totals = TotalsAggregator::appended(existing, records);
        let block = location.block.at_row(totals_row + inserted);
        render.finish_totals(book, &totals, &block)?;
        stages.advance(GenerationStage::TotalsRecalculated)?;

        tracing::info!(
            sheet = sheet_name,
            appended = instances.len(),
            totals_row = block.row,
            located_by = ?location.source,
            "appended sections"
        );
        Ok((
            GenerationMode::Append,
            RenderOutcome {
                instances,
                totals,
                block: Some(block),
                warnings,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::template::cell_text;
    use crate::totals::{TotalsBlock, write_totals_marker};

    /// A PAX tab that already holds one generated section and its totals.
    fn generated_pax(book: &mut Spreadsheet, config: &EngineConfig) {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A4").set_value("01/12/2025");
        sheet.get_cell_mut("B4").set_value("Glacier");
        sheet.get_cell_mut("D4").set_value_number(2);
        sheet.get_cell_mut("E4").set_value_number(1);
        sheet.get_cell_mut("F4").set_value_number(0);
        sheet.get_cell_mut("G4").set_value("Jackets");
        sheet.get_cell_mut("D6").set_value_number(2);
        sheet.get_cell_mut("E6").set_value_number(1);
        sheet.get_cell_mut("F6").set_value_number(0);
        let block = TotalsBlock::from_layout(&config.pax.totals, 6);
        write_totals_marker(book, "Sheet1", &config.pax.totals.marker_prefix, &block).unwrap();
    }

    #[test]
    fn appends_above_the_marked_totals() {
        let config = EngineConfig::default();
        let mut book = umya_spreadsheet::new_file();
        generated_pax(&mut book, &config);
        let controller =
            SuccessiveAppendController::new(&config.pax.section, &config.pax.totals, &config.vocabulary);

        let mut stages = StageTracker::loaded();
        let (mode, outcome) = controller
            .append_to_sheet(
                &mut book,
                "Sheet1",
                Some("02/12/2025"),
                &[TourRecord::new("Kayak").with_counts(5, 0, 1)],
                &mut stages,
            )
            .unwrap();

        assert_eq!(mode, GenerationMode::Append);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.totals, TotalsAccumulator::new(7, 1, 1));
        let sheet = book.get_sheet_by_name("Sheet1").unwrap();
        assert_eq!(cell_text(sheet, "B4"), "Glacier");
        assert_eq!(cell_text(sheet, "A6"), "02/12/2025");
        assert_eq!(cell_text(sheet, "B6"), "Kayak");
        assert_eq!(cell_text(sheet, "D6"), "5");
        assert_eq!(cell_text(sheet, "D8"), "7");
        assert_eq!(cell_text(sheet, "F8"), "1");
        assert_eq!(outcome.block.unwrap().row, 8);
    }

    #[test]
    fn totals_directly_under_the_section_leave_nothing_to_reuse() {
        let config = EngineConfig::default();
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("D4").set_value_number(0);
        let block = TotalsBlock::from_layout(&config.pax.totals, 4);
        write_totals_marker(&mut book, "Sheet1", &config.pax.totals.marker_prefix, &block).unwrap();

        let controller =
            SuccessiveAppendController::new(&config.pax.section, &config.pax.totals, &config.vocabulary);
        let err = controller
            .append_to_sheet(
                &mut book,
                "Sheet1",
                None,
                &[TourRecord::new("Kayak")],
                &mut StageTracker::loaded(),
            )
            .unwrap_err();
        assert!(matches!(err, ReportError::Replication(_)));
    }
}
