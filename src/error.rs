//! Error and warning taxonomy for report generation.
//!
//! Structural problems abort a request through [`ReportError`]. Anything the
//! pipeline can recover from is recorded as a [`ReportWarning`] and surfaces in
//! the summary returned to the caller.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type ReportResult<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    /// An expected worksheet or cell region is absent.
    #[error("document structure error in {}: {detail}", path.display())]
    DocumentStructure { path: PathBuf, detail: String },

    /// The template cannot be replicated (zero-height section, missing sheet).
    #[error("replication error: {0}")]
    Replication(String),

    /// Another request holds the lock for this (ship, report) key.
    #[error("report {key} is busy (waited {waited_ms} ms for the lock)")]
    Busy { key: String, waited_ms: u64 },

    #[error("failed to read workbook {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to write workbook {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report worker failed: {0}")]
    Task(String),
}

impl ReportError {
    pub fn structure(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::DocumentStructure {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn replication(detail: impl Into<String>) -> Self {
        Self::Replication(detail.into())
    }

    /// Attaches the document path to a structure error raised without one.
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::DocumentStructure { path: old, detail } if old.as_os_str().is_empty() => {
                Self::DocumentStructure {
                    path: path.into(),
                    detail,
                }
            }
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::Io(_) | Self::Task(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::DocumentStructure { .. } => "document_structure",
            Self::Replication(_) => "template_configuration",
            Self::Busy { .. } => "busy",
            Self::Read { .. } | Self::Write { .. } | Self::Io(_) => "io_error",
            Self::Task(_) => "server_error",
        }
    }
}

/// Non-fatal conditions collected while generating a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportWarning {
    /// A field could not be parsed and fell back to a default.
    Parse { location: String, detail: String },
    /// The totals block was found by heuristic or fallback rather than a marker.
    TotalsLocation { detail: String },
    /// A required placeholder token never appeared in a section.
    MissingToken { token: String, rows: String },
    /// The report date routed to the default tab.
    TabFallback { detail: String },
    /// The template is missing optional structure.
    Template { detail: String },
}

impl fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportWarning::Parse { location, detail } => write!(f, "parse: {location}: {detail}"),
            ReportWarning::TotalsLocation { detail } => write!(f, "totals location: {detail}"),
            ReportWarning::MissingToken { token, rows } => {
                write!(f, "token {token} not found in section rows {rows}")
            }
            ReportWarning::TabFallback { detail } => write!(f, "tab routing: {detail}"),
            ReportWarning::Template { detail } => write!(f, "template: {detail}"),
        }
    }
}

/// Logs each warning as it is recorded so the trace mirrors the summary.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Warnings(Vec<ReportWarning>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ReportWarning) {
        tracing::warn!(warning = %warning, "report warning");
        self.0.push(warning);
    }

    pub fn extend(&mut self, other: Warnings) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportWarning> {
        self.0.iter()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}
