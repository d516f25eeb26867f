//! Fresh rendering of one report worksheet from its pristine template block.

use crate::config::{SectionLayout, TotalsLayout};
use crate::error::{ReportError, ReportResult, Warnings};
use crate::model::{TotalsAccumulator, TourRecord};
use crate::report::{GenerationStage, StageTracker};
use crate::routing::find_sheet_name;
use crate::template::{
    PlaceholderSubstitutionEngine, ReplicatedInstance, RowRange, SectionReplicator,
    TemplateSection, TokenVocabulary, drop_merges_within,
};
use crate::totals::{TotalsAggregator, TotalsBlock, write_totals_marker};
use umya_spreadsheet::{Spreadsheet, Worksheet};

#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    pub instances: Vec<ReplicatedInstance>,
    pub totals: TotalsAccumulator,
    pub block: Option<TotalsBlock>,
    pub warnings: Warnings,
}

/// Everything needed to render sections onto one worksheet.
#[derive(Debug, Clone, Copy)]
pub struct SheetRender<'a> {
    pub sheet_name: &'a str,
    pub section: &'a SectionLayout,
    pub totals: &'a TotalsLayout,
    pub vocabulary: &'a TokenVocabulary,
    /// Written into the section's date column on each section's first row.
    pub section_date: Option<&'a str>,
}

/// Name of the worksheet a section layout targets: the configured one, or the first.
pub fn resolve_sheet_name(book: &Spreadsheet, layout: &SectionLayout) -> ReportResult<String> {
    match layout.sheet.as_deref() {
        Some(name) => find_sheet_name(book, name).ok_or_else(|| {
            ReportError::replication(format!("target worksheet '{name}' is missing"))
        }),
        None => book
            .get_sheet(&0)
            .map(|sheet| sheet.get_name().to_string())
            .ok_or_else(|| ReportError::replication("workbook has no worksheets")),
    }
}

impl<'a> SheetRender<'a> {
    pub fn sheet<'b>(&self, book: &'b Spreadsheet) -> ReportResult<&'b Worksheet> {
        book.get_sheet_by_name(self.sheet_name).ok_or_else(|| {
            ReportError::replication(format!("target worksheet '{}' is missing", self.sheet_name))
        })
    }

    pub fn sheet_mut<'b>(&self, book: &'b mut Spreadsheet) -> ReportResult<&'b mut Worksheet> {
        book.get_sheet_by_name_mut(self.sheet_name).ok_or_else(|| {
            ReportError::replication(format!("target worksheet '{}' is missing", self.sheet_name))
        })
    }

    pub fn capture(&self, book: &Spreadsheet) -> ReportResult<TemplateSection> {
        TemplateSection::capture(self.sheet(book)?, self.section.rows(), self.section.columns())
    }

    /// A worksheet is pristine while its section rows still hold section tokens.
    pub fn is_pristine(&self, book: &Spreadsheet) -> ReportResult<bool> {
        Ok(self.capture(book)?.has_section_tokens(self.vocabulary))
    }

    pub fn aggregator(&self) -> TotalsAggregator<'a> {
        TotalsAggregator::new(self.totals, self.vocabulary)
    }

    pub fn render_fresh(
        &self,
        book: &mut Spreadsheet,
        records: &[TourRecord],
        stages: &mut StageTracker,
    ) -> ReportResult<RenderOutcome> {
        let mut warnings = Warnings::new();
        let section = self.capture(book)?;
        let start = section.rows.start;
        let aggregator = self.aggregator();

        let sheet = self.sheet_mut(book)?;
        let block = aggregator.locate_in_template(sheet, section.rows.end, &mut warnings)?;

        let replicator = SectionReplicator::new(&section, self.boundary_column());
        let instances = replicator.replicate(sheet, start, records.len())?;
        let inserted = replicator.stride() * instances.len() as u32;
        stages.advance(GenerationStage::SectionsInserted)?;

        // The pristine block (and its separator, when the totals leave room for one)
        // now sits below the copies.
        let removed = (section.height() + 1).min(block.row - start);
        let template_rows = RowRange::new(start + inserted, start + inserted + removed - 1);
        drop_merges_within(sheet, template_rows);
        sheet.remove_row(&template_rows.start, &removed);

        self.substitute_all(sheet, &instances, records, &mut warnings);
        stages.advance(GenerationStage::PlaceholdersSubstituted)?;

        let totals = TotalsAggregator::fresh(records);
        let block = block.at_row(block.row + inserted - removed);
        self.finish_totals(book, &totals, &block)?;
        stages.advance(GenerationStage::TotalsRecalculated)?;

        tracing::info!(
            sheet = self.sheet_name,
            sections = instances.len(),
            totals_row = block.row,
            "rendered fresh report sheet"
        );
        Ok(RenderOutcome {
            instances,
            totals,
            block: Some(block),
            warnings,
        })
    }

    pub(crate) fn boundary_column(&self) -> Option<u32> {
        self.section.boundary_column.map(|column| column.index())
    }

    pub(crate) fn substitute_all(
        &self,
        sheet: &mut Worksheet,
        instances: &[ReplicatedInstance],
        records: &[TourRecord],
        warnings: &mut Warnings,
    ) {
        let engine = PlaceholderSubstitutionEngine::new(
            self.vocabulary,
            self.section.notes_merge_to.map(|column| column.index()),
        );
        let columns = self.section.columns();
        for (instance, record) in instances.iter().zip(records) {
            let outcome = engine.substitute(sheet, instance.rows, columns, record);
            warnings.extend(outcome.warnings);

            if let (Some(column), Some(date)) = (self.section.date_column, self.section_date) {
                sheet
                    .get_cell_mut((column.index(), instance.rows.start))
                    .set_value(date.to_string());
            }
        }
    }

    /// Renders totals, clears any leftover totals tokens and moves the marker.
    pub(crate) fn finish_totals(
        &self,
        book: &mut Spreadsheet,
        totals: &TotalsAccumulator,
        block: &TotalsBlock,
    ) -> ReportResult<()> {
        let sheet = self.sheet_mut(book)?;
        self.aggregator().render(sheet, totals, block);
        PlaceholderSubstitutionEngine::new(self.vocabulary, None).substitute_totals(sheet, totals);
        write_totals_marker(book, self.sheet_name, &self.totals.marker_prefix, block)
    }
}
