//! Conflict workflow manager.
//!
//! [`ConflictWorkflow`] is constructed once per process and handed to every
//! command handler. It owns the detector (and with it the single active
//! session), the resolution service, the view, and the host collaborators.
//!
//! Every mutation goes through here and is followed by a view re-render, so
//! the view only ever shows the current session.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::conflict::cancel::CancelToken;
use crate::conflict::detector::{lock_detector, ConflictDetector, DetectorStatus, SharedDetector};
use crate::conflict::diff::{diff_request, DiffPresenter, DiffRequest};
use crate::conflict::differ::{CommonDirDirectoryDiffer, DirectoryDiffResults, DirectoryDiffer};
use crate::conflict::model::{ConflictFile, Resolution};
use crate::conflict::resolver::{ConflictResolutionService, ResolutionOutcome};
use crate::conflict::strategy::{ResolutionReport, ResolutionStrategy};
use crate::conflict::view::ConflictView;
use crate::errors::ConflictError;
use crate::host::Host;
use crate::process::CommandRunner;

/// Result of a completed detection.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionSummary {
    pub session_id: Uuid,
    pub diff: DirectoryDiffResults,
    pub conflicts: Vec<ConflictFile>,
}

impl DetectionSummary {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Abandons the scan if `detect` is dropped before the result is installed,
/// so an abandoned future never leaves the detector stuck in `Scanning`.
struct ScanGuard<'a> {
    detector: &'a SharedDetector,
    token: CancelToken,
    armed: bool,
}

impl<'a> ScanGuard<'a> {
    fn new(detector: &'a SharedDetector, token: CancelToken) -> Self {
        Self {
            detector,
            token,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("conflict detection dropped before completion");
            lock_detector(self.detector).abandon_scan(&self.token);
        }
    }
}

pub struct ConflictWorkflow {
    detector: SharedDetector,
    resolver: ConflictResolutionService,
    view: Mutex<ConflictView>,
    presenter: Arc<dyn DiffPresenter>,
    host: Host,
    local_root: PathBuf,
    remote_root: PathBuf,
}

impl ConflictWorkflow {
    /// Build the workflow from configuration with the default differ.
    pub fn new(config: &AppConfig, presenter: Arc<dyn DiffPresenter>, host: Host) -> Self {
        let differ = Arc::new(CommonDirDirectoryDiffer::new(
            config.conflict.compare,
            config.conflict.ignore_patterns.clone(),
        ));
        Self::with_differ(config, differ, presenter, host)
    }

    pub fn with_differ(
        config: &AppConfig,
        differ: Arc<dyn DirectoryDiffer>,
        presenter: Arc<dyn DiffPresenter>,
        host: Host,
    ) -> Self {
        let detector: SharedDetector = Arc::new(Mutex::new(ConflictDetector::new(differ)));
        let sync_command = config
            .conflict
            .sync_command
            .as_deref()
            .and_then(CommandRunner::from_argv);
        info!(
            local = %config.local_root().display(),
            remote = %config.remote_root().display(),
            sync_command = sync_command.is_some(),
            "initializing conflict workflow"
        );
        Self {
            resolver: ConflictResolutionService::new(Arc::clone(&detector), sync_command),
            detector,
            view: Mutex::new(ConflictView::new()),
            presenter,
            host,
            local_root: config.local_root(),
            remote_root: config.remote_root(),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Configured `(local, remote)` roots.
    pub fn roots(&self) -> (&Path, &Path) {
        (&self.local_root, &self.remote_root)
    }

    // -----------------------------------------------------------------------
    // Detection
    // -----------------------------------------------------------------------

    /// Compare `local` against `remote` and open a new session.
    ///
    /// The directory walk runs on the blocking pool. Re-running detection
    /// replaces the current session; a failed or cancelled scan leaves the
    /// previous state as it was.
    pub async fn detect(
        &self,
        local: impl Into<PathBuf>,
        remote: impl Into<PathBuf>,
    ) -> Result<DetectionSummary, ConflictError> {
        let job = lock_detector(&self.detector)
            .begin_scan(local, remote)
            .map_err(|e| self.report("conflict detection", e))?;
        let token = job.token().clone();
        let mut guard = ScanGuard::new(&self.detector, token.clone());

        let result = match tokio::task::spawn_blocking(move || job.run()).await {
            Ok(result) => result,
            Err(e) => Err(ConflictError::TaskFailed(e.to_string())),
        };

        let summary = {
            let mut detector = lock_detector(&self.detector);
            guard.disarm();
            detector.finish_scan(&token, result).map(|session| DetectionSummary {
                session_id: session.id,
                diff: session.diff.clone(),
                conflicts: session.unresolved().cloned().collect(),
            })
        };
        self.refresh_view();

        let summary = summary.map_err(|e| self.report("conflict detection", e))?;
        if !summary.has_conflicts() {
            self.host.notifier.show_info("No conflicts detected");
        }
        Ok(summary)
    }

    /// Detect using the configured local and remote roots.
    pub async fn detect_configured(&self) -> Result<DetectionSummary, ConflictError> {
        self.detect(self.local_root.clone(), self.remote_root.clone())
            .await
    }

    /// Cancel the running scan, or discard the ready session.
    pub fn cancel(&self) {
        lock_detector(&self.detector).cancel();
        self.refresh_view();
    }

    pub fn reset(&self) {
        lock_detector(&self.detector).reset();
        self.refresh_view();
    }

    pub fn status(&self) -> DetectorStatus {
        lock_detector(&self.detector).status()
    }

    /// Snapshot of the unresolved conflicts, sorted by file name.
    pub fn unresolved(&self) -> Vec<ConflictFile> {
        lock_detector(&self.detector)
            .session()
            .map(|s| s.unresolved().cloned().collect())
            .unwrap_or_default()
    }

    pub fn find(&self, file_name: &str) -> Option<ConflictFile> {
        lock_detector(&self.detector)
            .session()
            .and_then(|s| s.find(file_name).cloned())
    }

    pub fn diff_results(&self) -> Option<DirectoryDiffResults> {
        lock_detector(&self.detector)
            .session()
            .map(|s| s.diff.clone())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    pub async fn accept_local(
        &self,
        file: &ConflictFile,
    ) -> Result<ResolutionOutcome, ConflictError> {
        self.resolve(file, Resolution::AcceptLocal).await
    }

    pub async fn accept_remote(
        &self,
        file: &ConflictFile,
    ) -> Result<ResolutionOutcome, ConflictError> {
        self.resolve(file, Resolution::AcceptRemote).await
    }

    async fn resolve(
        &self,
        file: &ConflictFile,
        resolution: Resolution,
    ) -> Result<ResolutionOutcome, ConflictError> {
        let result = self.resolver.resolve(file, resolution).await;
        self.refresh_view();
        result.map_err(|e| self.report(&format!("resolving {}", file.file_name), e))
    }

    /// Run a resolution strategy against the active session.
    ///
    /// `ResolveAll` works on a snapshot of the unresolved set and keeps going
    /// past individual failures; they are collected in the report.
    pub async fn perform(
        &self,
        strategy: &ResolutionStrategy,
    ) -> Result<ResolutionReport, ConflictError> {
        info!(%strategy, "performing conflict resolution");
        let mut report = ResolutionReport::default();

        match strategy {
            ResolutionStrategy::ResolveOne { file, resolution } => {
                let outcome = self.resolve(file, *resolution).await?;
                report.resolved.push(outcome.file_name);
                report.remaining = outcome.remaining;
            }
            ResolutionStrategy::ResolveAll { resolution } => {
                let snapshot: Option<Vec<ConflictFile>> = lock_detector(&self.detector)
                    .session()
                    .map(|s| s.unresolved().cloned().collect());
                let Some(snapshot) = snapshot else {
                    return Err(self.report("perform", ConflictError::NoActiveSession));
                };

                for file in &snapshot {
                    match self.resolver.resolve(file, *resolution).await {
                        Ok(outcome) => {
                            report.resolved.push(outcome.file_name);
                            report.remaining = outcome.remaining;
                        }
                        Err(e) => {
                            warn!(file = %file.file_name, error = %e, "resolution failed");
                            report.failed.push((file.file_name.clone(), e.to_string()));
                        }
                    }
                }
                report.remaining = self.unresolved().len();
                self.refresh_view();

                if !report.is_success() {
                    self.host.notifier.show_error(&format!(
                        "{} of {} conflicts could not be resolved",
                        report.failed.len(),
                        snapshot.len()
                    ));
                }
            }
        }

        info!(
            resolved = report.resolved.len(),
            failed = report.failed.len(),
            remaining = report.remaining,
            "perform finished"
        );
        Ok(report)
    }

    /// Run the operation configured on the view.
    pub async fn perform_configured(&self) -> Result<ResolutionReport, ConflictError> {
        let operation = self.view().operation().cloned();
        match operation {
            Some(strategy) => self.perform(&strategy).await,
            None => Err(self.report("perform", ConflictError::NoOperation)),
        }
    }

    pub fn set_operation(&self, operation: Option<ResolutionStrategy>) {
        self.view().set_operation(operation);
    }

    // -----------------------------------------------------------------------
    // Presentation
    // -----------------------------------------------------------------------

    /// Ask the host to open a two-way comparison for `file`.
    pub fn show_diff(&self, file: &ConflictFile) -> Result<DiffRequest, ConflictError> {
        let request = diff_request(file);
        self.presenter
            .open_diff(&request)
            .map_err(|e| self.report("opening diff", e))?;
        Ok(request)
    }

    pub fn view(&self) -> MutexGuard<'_, ConflictView> {
        self.view
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh_view(&self) {
        let files = self.unresolved();
        self.view().render(&files);
    }

    /// Surface a failure to the user. Cancellation is not a failure.
    fn report(&self, context: &str, e: ConflictError) -> ConflictError {
        if matches!(e, ConflictError::Cancelled) {
            info!(context, "operation cancelled");
        } else {
            error!(context, error = %e, "conflict operation failed");
            self.host.notifier.show_error(&format!("{}: {}", context, e));
        }
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostEvent, MemoryHost};

    #[derive(Default)]
    struct RecordingPresenter {
        opened: Mutex<Vec<DiffRequest>>,
    }

    impl DiffPresenter for RecordingPresenter {
        fn open_diff(&self, request: &DiffRequest) -> Result<(), ConflictError> {
            self.opened.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    struct Fixture {
        workspace: tempfile::TempDir,
        memory: Arc<MemoryHost>,
        presenter: Arc<RecordingPresenter>,
        workflow: ConflictWorkflow,
    }

    fn fixture(files: &[(&str, &str, &str)]) -> Fixture {
        let workspace = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.workspace.root = workspace.path().to_path_buf();
        std::fs::create_dir_all(config.local_root()).unwrap();
        std::fs::create_dir_all(config.remote_root()).unwrap();
        for (name, local, remote) in files {
            std::fs::write(config.local_root().join(name), local).unwrap();
            std::fs::write(config.remote_root().join(name), remote).unwrap();
        }

        let memory = Arc::new(MemoryHost::new());
        let presenter = Arc::new(RecordingPresenter::default());
        let workflow = ConflictWorkflow::new(
            &config,
            presenter.clone(),
            Host::from_shared(memory.clone()),
        );
        Fixture {
            workspace,
            memory,
            presenter,
            workflow,
        }
    }

    #[tokio::test]
    async fn test_detect_renders_view() {
        let fx = fixture(&[("a.cls", "1", "2"), ("b.cls", "same", "same")]);
        let summary = fx.workflow.detect_configured().await.unwrap();

        assert_eq!(summary.conflicts.len(), 1);
        assert_eq!(
            fx.workflow.status(),
            DetectorStatus::Ready {
                has_conflicts: true
            }
        );
        let view = fx.workflow.view();
        assert_eq!(view.title(), "Conflicts (1)");
        assert_eq!(view.selected().unwrap().label, "a.cls");
    }

    #[tokio::test]
    async fn test_clean_detection_notifies() {
        let fx = fixture(&[("a.cls", "1", "1")]);
        let summary = fx.workflow.detect_configured().await.unwrap();
        assert!(!summary.has_conflicts());
        assert!(fx
            .memory
            .events()
            .contains(&HostEvent::Info("No conflicts detected".into())));
    }

    #[tokio::test]
    async fn test_missing_root_keeps_prior_session() {
        let fx = fixture(&[("a.cls", "1", "2")]);
        fx.workflow.detect_configured().await.unwrap();

        let missing = fx.workspace.path().join("missing");
        let result = fx.workflow.detect(&missing, &missing).await;
        assert!(matches!(result, Err(ConflictError::Filesystem { .. })));
        assert_eq!(fx.workflow.unresolved().len(), 1);
        assert!(fx
            .memory
            .events()
            .iter()
            .any(|e| matches!(e, HostEvent::Error(m) if m.starts_with("conflict detection"))));
    }

    #[tokio::test]
    async fn test_cancel_discards_session() {
        let fx = fixture(&[("a.cls", "1", "2")]);
        fx.workflow.detect_configured().await.unwrap();
        fx.workflow.cancel();
        assert_eq!(fx.workflow.status(), DetectorStatus::Idle);
        assert!(fx.workflow.view().is_empty());
        assert!(fx.workflow.diff_results().is_none());
    }

    /// Differ that blocks until cancelled once `stall` is set.
    struct StallingDiffer {
        inner: CommonDirDirectoryDiffer,
        stall: Arc<std::sync::atomic::AtomicBool>,
    }

    impl DirectoryDiffer for StallingDiffer {
        fn diff(
            &self,
            local_root: &Path,
            remote_root: &Path,
            cancel: &CancelToken,
        ) -> Result<DirectoryDiffResults, ConflictError> {
            if self.stall.load(std::sync::atomic::Ordering::SeqCst) {
                let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
                while !cancel.is_cancelled() && std::time::Instant::now() < deadline {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                return Err(ConflictError::Cancelled);
            }
            self.inner.diff(local_root, remote_root, cancel)
        }
    }

    #[tokio::test]
    async fn test_dropped_detection_restores_prior_session() {
        let fx = fixture(&[]);
        let mut config = AppConfig::default();
        config.workspace.root = fx.workspace.path().to_path_buf();
        std::fs::write(config.local_root().join("a.cls"), "1").unwrap();
        std::fs::write(config.remote_root().join("a.cls"), "2").unwrap();

        let stall = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let differ = Arc::new(StallingDiffer {
            inner: CommonDirDirectoryDiffer::default(),
            stall: stall.clone(),
        });
        let workflow = ConflictWorkflow::with_differ(
            &config,
            differ,
            fx.presenter.clone(),
            Host::from_shared(fx.memory.clone()),
        );
        let first = workflow.detect_configured().await.unwrap();

        stall.store(true, std::sync::atomic::Ordering::SeqCst);
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            workflow.detect_configured(),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(
            workflow.status(),
            DetectorStatus::Ready {
                has_conflicts: true
            }
        );
        assert_eq!(workflow.unresolved(), first.conflicts);

        stall.store(false, std::sync::atomic::Ordering::SeqCst);
        let again = workflow.detect_configured().await.unwrap();
        assert_ne!(again.session_id, first.session_id);
        assert_eq!(again.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_perform_resolve_all() {
        let fx = fixture(&[("a.cls", "1", "2"), ("b.cls", "x", "y")]);
        fx.workflow.detect_configured().await.unwrap();

        let report = fx
            .workflow
            .perform(&ResolutionStrategy::ResolveAll {
                resolution: Resolution::AcceptRemote,
            })
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.resolved, vec!["a.cls", "b.cls"]);
        assert_eq!(report.remaining, 0);
        assert_eq!(fx.workflow.status(), DetectorStatus::Idle);
        assert!(fx.workflow.view().is_empty());

        let summary = fx.workflow.detect_configured().await.unwrap();
        assert!(!summary.has_conflicts());
    }

    #[tokio::test]
    async fn test_perform_without_session_or_operation() {
        let fx = fixture(&[]);
        let all = ResolutionStrategy::ResolveAll {
            resolution: Resolution::AcceptLocal,
        };
        assert!(matches!(
            fx.workflow.perform(&all).await,
            Err(ConflictError::NoActiveSession)
        ));
        assert!(matches!(
            fx.workflow.perform_configured().await,
            Err(ConflictError::NoOperation)
        ));
    }

    #[tokio::test]
    async fn test_perform_configured_single() {
        let fx = fixture(&[("a.cls", "1", "2"), ("b.cls", "x", "y")]);
        fx.workflow.detect_configured().await.unwrap();
        let file = fx.workflow.find("b.cls").unwrap();
        fx.workflow.set_operation(Some(ResolutionStrategy::ResolveOne {
            file,
            resolution: Resolution::AcceptLocal,
        }));

        let report = fx.workflow.perform_configured().await.unwrap();
        assert_eq!(report.resolved, vec!["b.cls"]);
        assert_eq!(report.remaining, 1);
        // The single-file operation no longer applies once its file is gone.
        assert!(fx.workflow.view().operation().is_none());
    }

    #[tokio::test]
    async fn test_show_diff_uses_presenter() {
        let fx = fixture(&[("a.cls", "1", "2")]);
        fx.workflow.detect_configured().await.unwrap();
        let file = fx.workflow.find("a.cls").unwrap();

        let request = fx.workflow.show_diff(&file).unwrap();
        assert_eq!(request.title, "REMOTE: a.cls ↔ LOCAL: a.cls");
        assert_eq!(fx.presenter.opened.lock().unwrap().as_slice(), &[request]);
    }
}
