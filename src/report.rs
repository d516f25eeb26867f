//! The synchronous report pipeline: extract, render or append, persist.

use crate::append::SuccessiveAppendController;
use crate::config::{EngineConfig, HeaderCells};
use crate::dates::format_dmy;
use crate::error::{ReportError, ReportResult};
use crate::extract::{RecordExtractor, merge_by_name};
use crate::model::{CellValue, GenerationMode, ReportHeader, ReportKind, ReportSummary};
use crate::render::resolve_sheet_name;
use crate::routing::DateTabRouter;
use crate::store::WorkbookStore;
use crate::utils::path_to_forward_slashes;
use serde::Serialize;
use std::path::PathBuf;
use strum::Display;
use umya_spreadsheet::Worksheet;

/// Where a request's output starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseDocument {
    /// A blank template; always a fresh render.
    Template(PathBuf),
    /// A previously generated report to append to.
    Existing(PathBuf),
    /// Append when `existing` is present, otherwise start from `template`.
    ExistingOrTemplate { existing: PathBuf, template: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub ship_id: String,
    pub kind: ReportKind,
    pub source: PathBuf,
    pub base: BaseDocument,
    pub output: PathBuf,
    /// Overrides the dispatch header date for PAX routing.
    pub report_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GenerationStage {
    Idle,
    DocumentLoaded,
    SectionsInserted,
    PlaceholdersSubstituted,
    TotalsRecalculated,
    Persisted,
    Failed,
}

impl GenerationStage {
    fn next(self) -> Option<GenerationStage> {
        use GenerationStage::*;
        match self {
            Idle => Some(DocumentLoaded),
            DocumentLoaded => Some(SectionsInserted),
            SectionsInserted => Some(PlaceholdersSubstituted),
            PlaceholdersSubstituted => Some(TotalsRecalculated),
            TotalsRecalculated => Some(Persisted),
            Persisted | Failed => None,
        }
    }
}

/// Enforces the forward-only stage order of one request.
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: GenerationStage,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: GenerationStage::Idle,
        }
    }

    /// A tracker whose document is already in memory.
    pub fn loaded() -> Self {
        Self {
            current: GenerationStage::DocumentLoaded,
        }
    }

    pub fn current(&self) -> GenerationStage {
        self.current
    }

    pub fn advance(&mut self, to: GenerationStage) -> ReportResult<()> {
        if self.current.next() != Some(to) {
            return Err(ReportError::Task(format!(
                "invalid stage transition {} -> {to}",
                self.current
            )));
        }
        tracing::trace!(from = %self.current, to = %to, "stage");
        self.current = to;
        Ok(())
    }

    pub fn fail(&mut self) {
        self.current = GenerationStage::Failed;
    }
}

/// Runs one request end to end. The output path is only written when every
/// step succeeded.
pub fn generate(
    config: &EngineConfig,
    store: &dyn WorkbookStore,
    request: &ReportRequest,
) -> ReportResult<ReportSummary> {
    let mut stages = StageTracker::new();
    let result = run(config, store, request, &mut stages);
    if let Err(err) = &result {
        stages.fail();
        tracing::error!(
            ship = request.ship_id.as_str(),
            kind = %request.kind,
            category = err.category(),
            error = %err,
            "report generation failed"
        );
    }
    result
}

fn run(
    config: &EngineConfig,
    store: &dyn WorkbookStore,
    request: &ReportRequest,
    stages: &mut StageTracker,
) -> ReportResult<ReportSummary> {
    let source = store.load(&request.source)?;
    let extraction = RecordExtractor::new(&config.source).extract(&source)?;
    let mut warnings = extraction.warnings;
    let header = extraction.header;
    let records = match request.kind {
        ReportKind::Pax if config.pax.merge_duplicate_tours => merge_by_name(extraction.records),
        _ => extraction.records,
    };

    let base_path = match &request.base {
        BaseDocument::Template(path) | BaseDocument::Existing(path) => path,
        BaseDocument::ExistingOrTemplate { existing, template } => {
            if store.exists(existing) {
                existing
            } else {
                template
            }
        }
    };
    let mut document = store.load(base_path)?;
    stages.advance(GenerationStage::DocumentLoaded)?;
    let path = document.path.clone();

    let (section, totals) = config.layout(request.kind);
    let controller = SuccessiveAppendController::new(section, totals, &config.vocabulary);

    let mut tab_name = None;
    let (mode, outcome) = match request.kind {
        ReportKind::Eod => {
            let sheet_name = resolve_sheet_name(&document.book, section)?;
            let (mode, outcome) = controller
                .append_to_sheet(&mut document.book, &sheet_name, None, &records, stages)
                .map_err(|err| err.with_path(&path))?;
            if mode == GenerationMode::Fresh {
                if let Some(sheet) = document.book.get_sheet_by_name_mut(&sheet_name) {
                    write_header(sheet, &config.eod.header, &header);
                }
            }
            (mode, outcome)
        }
        ReportKind::Pax => {
            let raw = match request.report_date.as_deref().map(str::trim) {
                Some(date) if !date.is_empty() => CellValue::Text(date.to_string()),
                _ if header.report_date.is_empty() => CellValue::Empty,
                _ => CellValue::Text(header.report_date.clone()),
            };
            let router = DateTabRouter::new(&config.pax.tabs, &config.pax.default_tab);
            let route = router
                .route(&document.book, &raw)
                .map_err(|err| err.with_path(&path))?;
            let section_date = route
                .parsed_date
                .map(format_dmy)
                .unwrap_or_else(|| raw.as_text());
            warnings.extend(route.warnings);

            let result = controller
                .append_to_sheet(
                    &mut document.book,
                    &route.sheet_name,
                    Some(&section_date),
                    &records,
                    stages,
                )
                .map_err(|err| err.with_path(&path))?;
            tab_name = Some(route.tab_name);
            result
        }
    };
    warnings.extend(outcome.warnings);

    store.persist(&document, &request.output)?;
    stages.advance(GenerationStage::Persisted)?;

    let summary = ReportSummary {
        kind: request.kind,
        mode,
        record_count: outcome.instances.len(),
        totals: outcome.totals,
        tab_name,
        warnings: warnings.to_strings(),
        output: path_to_forward_slashes(&request.output),
    };
    tracing::info!(
        ship = request.ship_id.as_str(),
        kind = %summary.kind,
        mode = %summary.mode,
        records = summary.record_count,
        adults = summary.totals.adults,
        children = summary.totals.children,
        comp = summary.totals.comp,
        warnings = summary.warnings.len(),
        "report generated"
    );
    Ok(summary)
}

fn write_header(sheet: &mut Worksheet, cells: &HeaderCells, header: &ReportHeader) {
    let fields = [
        (cells.ship_name, &header.ship_name),
        (cells.cruise_line, &header.cruise_line),
        (cells.report_date, &header.report_date),
        (cells.port, &header.port),
        (cells.country, &header.country),
        (cells.tour_operator, &header.tour_operator),
        (cells.shorex_manager, &header.shorex_manager),
        (cells.assistant_manager, &header.assistant_manager),
    ];
    for (cell, value) in fields {
        if let Some(cell) = cell.filter(|_| !value.is_empty()) {
            sheet.get_cell_mut((cell.col, cell.row)).set_value(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_only_move_forward() {
        let mut stages = StageTracker::new();
        stages.advance(GenerationStage::DocumentLoaded).unwrap();
        assert!(stages.advance(GenerationStage::TotalsRecalculated).is_err());
        stages.advance(GenerationStage::SectionsInserted).unwrap();
        stages.advance(GenerationStage::PlaceholdersSubstituted).unwrap();
        stages.advance(GenerationStage::TotalsRecalculated).unwrap();
        stages.advance(GenerationStage::Persisted).unwrap();
        assert!(stages.advance(GenerationStage::Persisted).is_err());
        stages.fail();
        assert_eq!(stages.current(), GenerationStage::Failed);
        assert_eq!(GenerationStage::SectionsInserted.to_string(), "sections_inserted");
    }
}
