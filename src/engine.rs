use crate::config::{EngineConfig, GenerateArgs};
use crate::error::{ReportError, ReportResult};
use crate::locks::{LockKey, ReportLocks};
use crate::model::{ReportKind, ReportSummary};
use crate::report::{BaseDocument, ReportRequest, generate};
use crate::routing::DateTabRouter;
use crate::store::{FileWorkbookStore, WorkbookStore};
use anyhow::{Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task;

impl ReportRequest {
    pub fn from_args(args: GenerateArgs) -> Result<Self> {
        let base = match (args.existing, args.template) {
            (Some(existing), Some(template)) => BaseDocument::ExistingOrTemplate { existing, template },
            (Some(existing), None) => BaseDocument::Existing(existing),
            (None, Some(template)) => BaseDocument::Template(template),
            (None, None) => bail!("either --template or --existing is required"),
        };
        Ok(Self {
            ship_id: args.ship,
            kind: args.kind,
            source: args.source,
            base,
            output: args.output,
            report_date: args.date,
        })
    }
}

/// Shared entry point for report requests.
///
/// Requests for the same ship and report kind run one at a time; the workbook
/// work itself happens on the blocking pool.
#[derive(Clone)]
pub struct ReportEngine {
    config: Arc<EngineConfig>,
    store: Arc<dyn WorkbookStore>,
    locks: Arc<ReportLocks>,
}

impl ReportEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(config, Arc::new(FileWorkbookStore))
    }

    pub fn with_store(config: EngineConfig, store: Arc<dyn WorkbookStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            locks: Arc::new(ReportLocks::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(&self, request: ReportRequest) -> ReportResult<ReportSummary> {
        let started = Instant::now();
        let key = LockKey::new(request.ship_id.clone(), request.kind);
        let _guard = self.locks.acquire(key, self.config.locks.timeout()).await?;

        let config = self.config.clone();
        let store = self.store.clone();
        let summary = task::spawn_blocking(move || generate(&config, store.as_ref(), &request))
            .await
            .map_err(|err| ReportError::Task(err.to_string()))??;

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            kind = %summary.kind,
            "request finished"
        );
        Ok(summary)
    }

    /// Tabs from the routing table that `template` does not contain.
    pub fn check_pax_template(&self, template: &Path) -> ReportResult<Vec<String>> {
        let document = self.store.load(template)?;
        let pax = &self.config.pax;
        let missing = DateTabRouter::new(&pax.tabs, &pax.default_tab).validate_template(&document.book);
        if !missing.is_empty() {
            tracing::warn!(
                template = %template.display(),
                kind = %ReportKind::Pax,
                missing = missing.len(),
                "PAX template is missing monthly tabs"
            );
        }
        Ok(missing)
    }
}

impl std::fmt::Debug for ReportEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportEngine")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}
