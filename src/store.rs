use crate::error::{ReportError, ReportResult};
use std::fs;
use std::path::{Path, PathBuf};
use umya_spreadsheet::Spreadsheet;

/// An in-memory workbook and the path it was loaded from.
#[derive(Debug)]
pub struct ReportDocument {
    pub path: PathBuf,
    pub book: Spreadsheet,
}

impl ReportDocument {
    pub fn new(path: impl Into<PathBuf>, book: Spreadsheet) -> Self {
        Self {
            path: path.into(),
            book,
        }
    }
}

/// Loads and persists workbooks on behalf of the engine.
pub trait WorkbookStore: Send + Sync {
    fn load(&self, path: &Path) -> ReportResult<ReportDocument>;

    /// Writes the whole workbook to `output`; readers never observe a partial file.
    fn persist(&self, document: &ReportDocument, output: &Path) -> ReportResult<()>;

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileWorkbookStore;

impl WorkbookStore for FileWorkbookStore {
    fn load(&self, path: &Path) -> ReportResult<ReportDocument> {
        let book = umya_spreadsheet::reader::xlsx::read(path).map_err(|err| ReportError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        tracing::debug!(path = %path.display(), sheets = book.get_sheet_collection().len(), "loaded workbook");
        Ok(ReportDocument::new(path, book))
    }

    fn persist(&self, document: &ReportDocument, output: &Path) -> ReportResult<()> {
        let write_error = |message: String| ReportError::Write {
            path: output.to_path_buf(),
            message,
        };
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let temp = tempfile::Builder::new()
            .prefix(".dispatch-report-")
            .suffix(".xlsx")
            .tempfile_in(dir)?;
        umya_spreadsheet::writer::xlsx::write(&document.book, temp.path())
            .map_err(|err| write_error(err.to_string()))?;
        temp.persist(output)
            .map_err(|err| write_error(err.error.to_string()))?;

        tracing::debug!(path = %output.display(), "persisted workbook");
        Ok(())
    }
}
