//! Anonymous code execution.
//!
//! A run is three steps, driven by [`Commandlet::run`]:
//! 1. **Check** -- a root workspace must be open.
//! 2. **Gather** -- the editor selection, or else the active file.
//! 3. **Execute** -- forward to the [`ExecuteService`]; failures are
//!    reported to the host, never propagated.

pub mod executor;
pub mod gatherer;
pub mod service;

use std::sync::Arc;

use tracing::{debug, warn};

pub use executor::{AnonymousExecutor, ExecuteOutcome, EXECUTE_TELEMETRY_NAME};
pub use gatherer::{
    ActiveDocument, AnonymousCodeGatherer, EditorState, ExecuteRequest, ExecuteSource, Gathered,
    Position, Selection, WorkspaceChecker,
};
pub use service::{CliExecuteService, ExecuteService};

use crate::config::AppConfig;
use crate::host::Host;

/// Result of one commandlet run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The check failed or the gatherer cancelled; nothing was executed.
    Cancelled,
    /// The execution ran and failed; the host was already notified.
    Failed,
    Completed(ExecuteOutcome),
}

/// Check, gather, execute.
pub struct Commandlet {
    checker: WorkspaceChecker,
    gatherer: AnonymousCodeGatherer,
    executor: AnonymousExecutor,
}

impl Commandlet {
    pub fn new(
        checker: WorkspaceChecker,
        gatherer: AnonymousCodeGatherer,
        executor: AnonymousExecutor,
    ) -> Self {
        Self {
            checker,
            gatherer,
            executor,
        }
    }

    /// Commandlet wired to the CLI-backed service from `config`.
    pub fn anonymous_execute(config: &AppConfig, host: Host) -> Self {
        let service = CliExecuteService::new(&config.execute, Some(config.workspace.root.clone()));
        let executor = AnonymousExecutor::new(host).with_service(Arc::new(service));
        Self::new(WorkspaceChecker, AnonymousCodeGatherer, executor)
    }

    pub async fn run(&self, editor: &EditorState) -> RunOutcome {
        if let Err(e) = self.checker.check(editor) {
            warn!(error = %e, "workspace check failed");
            self.executor.host().notifier.show_error(&e.to_string());
            return RunOutcome::Cancelled;
        }

        let request = match self.gatherer.gather(editor) {
            Gathered::Continue(request) => request,
            Gathered::Cancel => {
                debug!("gatherer cancelled");
                return RunOutcome::Cancelled;
            }
        };

        match self.executor.execute(&request).await {
            Some(outcome) => RunOutcome::Completed(outcome),
            None => RunOutcome::Failed,
        }
    }
}
