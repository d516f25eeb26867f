pub mod append;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod extract;
pub mod formula;
pub mod locks;
pub mod logging;
pub mod model;
pub mod render;
pub mod report;
pub mod routing;
pub mod store;
pub mod styles;
pub mod template;
pub mod totals;
pub mod utils;

pub use append::{AppendOutcome, SuccessiveAppendController};
pub use config::{CliArgs, Command, EngineConfig, GenerateArgs};
pub use engine::ReportEngine;
pub use error::{ReportError, ReportResult, ReportWarning, Warnings};
pub use extract::{Extraction, RecordExtractor};
pub use logging::{LoggingConfig, init_logging};
pub use model::{
    CellValue, GenerationMode, ReportHeader, ReportKind, ReportSummary, TotalsAccumulator,
    TourRecord,
};
pub use report::{BaseDocument, GenerationStage, ReportRequest, generate};
pub use routing::DateTabRouter;
pub use store::{FileWorkbookStore, ReportDocument, WorkbookStore};
pub use totals::TotalsAggregator;
