//! Conflict detection state machine.
//!
//! `Idle -> Scanning -> Ready`. A scan is split in three steps so the caller
//! can run the blocking directory walk off the event loop without holding the
//! detector lock:
//!
//! 1. [`ConflictDetector::begin_scan`] moves to `Scanning` and hands out a
//!    [`ScanJob`].
//! 2. [`ScanJob::run`] walks both trees.
//! 3. [`ConflictDetector::finish_scan`] installs the new session, or restores
//!    whatever state preceded the scan when it failed or was cancelled.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::differ::{DirectoryDiffResults, DirectoryDiffer};
use super::model::ConflictFile;
use super::session::ConflictSession;
use crate::errors::ConflictError;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Internal detector state.
#[derive(Debug)]
pub enum DetectorState {
    Idle,
    Scanning {
        prior: Box<DetectorState>,
        token: CancelToken,
    },
    Ready(ConflictSession),
}

/// Externally visible summary of [`DetectorState`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectorStatus {
    Idle,
    Scanning,
    Ready { has_conflicts: bool },
}

impl std::fmt::Display for DetectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Scanning => write!(f, "scanning"),
            Self::Ready { has_conflicts: true } => write!(f, "ready (conflicts)"),
            Self::Ready { has_conflicts: false } => write!(f, "ready (clean)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan job
// ---------------------------------------------------------------------------

/// A pending directory comparison, detached from the detector.
pub struct ScanJob {
    differ: Arc<dyn DirectoryDiffer>,
    local_root: PathBuf,
    remote_root: PathBuf,
    token: CancelToken,
}

impl ScanJob {
    /// Run the comparison. Blocks on filesystem I/O.
    pub fn run(self) -> Result<DirectoryDiffResults, ConflictError> {
        self.differ
            .diff(&self.local_root, &self.remote_root, &self.token)
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Detector shared between the workflow and the resolution service.
pub type SharedDetector = Arc<Mutex<ConflictDetector>>;

/// Lock a shared detector. A poisoned lock is recovered: every transition
/// leaves the state machine in a valid state before it can panic.
pub fn lock_detector(shared: &SharedDetector) -> MutexGuard<'_, ConflictDetector> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the single active conflict session.
pub struct ConflictDetector {
    differ: Arc<dyn DirectoryDiffer>,
    state: DetectorState,
}

impl ConflictDetector {
    pub fn new(differ: Arc<dyn DirectoryDiffer>) -> Self {
        Self {
            differ,
            state: DetectorState::Idle,
        }
    }

    pub fn status(&self) -> DetectorStatus {
        match &self.state {
            DetectorState::Idle => DetectorStatus::Idle,
            DetectorState::Scanning { .. } => DetectorStatus::Scanning,
            DetectorState::Ready(session) => DetectorStatus::Ready {
                has_conflicts: !session.is_complete(),
            },
        }
    }

    /// The session in the `Ready` state, if any.
    pub fn session(&self) -> Option<&ConflictSession> {
        match &self.state {
            DetectorState::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// Enter `Scanning`. Fails if a scan is already running.
    pub fn begin_scan(
        &mut self,
        local_root: impl Into<PathBuf>,
        remote_root: impl Into<PathBuf>,
    ) -> Result<ScanJob, ConflictError> {
        if matches!(self.state, DetectorState::Scanning { .. }) {
            return Err(ConflictError::ScanInProgress);
        }

        let token = CancelToken::new();
        let prior = std::mem::replace(&mut self.state, DetectorState::Idle);
        self.state = DetectorState::Scanning {
            prior: Box::new(prior),
            token: token.clone(),
        };
        debug!("conflict scan started");

        Ok(ScanJob {
            differ: Arc::clone(&self.differ),
            local_root: local_root.into(),
            remote_root: remote_root.into(),
            token,
        })
    }

    /// Complete a scan started with [`begin_scan`](Self::begin_scan).
    ///
    /// On success the new session replaces any previous one. On failure, or
    /// when the scan was cancelled, the state preceding the scan is restored
    /// and the error is returned.
    ///
    /// `token` identifies the scan; a result for a scan that was reset (and
    /// possibly replaced by a newer one) is discarded without touching state.
    pub fn finish_scan(
        &mut self,
        token: &CancelToken,
        result: Result<DirectoryDiffResults, ConflictError>,
    ) -> Result<&ConflictSession, ConflictError> {
        let Some(prior) = self.take_scan(token) else {
            debug!("discarding result of a scan that was reset");
            return Err(ConflictError::Cancelled);
        };

        let outcome = if token.is_cancelled() {
            Err(ConflictError::Cancelled)
        } else {
            result
        };

        match outcome {
            Ok(diff) => {
                let session = ConflictSession::from_diff(diff);
                info!(
                    session = %session.id,
                    conflicts = session.unresolved_count(),
                    "conflict detection complete"
                );
                self.state = DetectorState::Ready(session);
                self.session().ok_or(ConflictError::NoActiveSession)
            }
            Err(e) => {
                warn!(error = %e, "conflict scan failed, restoring previous state");
                self.state = *prior;
                Err(e)
            }
        }
    }

    /// Give up on the scan identified by `token`, restoring the state that
    /// preceded it. Used when the caller stops waiting for the result.
    pub fn abandon_scan(&mut self, token: &CancelToken) {
        token.cancel();
        if let Some(prior) = self.take_scan(token) {
            info!("conflict scan abandoned, restoring previous state");
            self.state = *prior;
        }
    }

    /// Leave `Scanning` if it belongs to `token`, returning the prior state.
    fn take_scan(&mut self, token: &CancelToken) -> Option<Box<DetectorState>> {
        match &self.state {
            DetectorState::Scanning { token: current, .. } if current.same_as(token) => {}
            _ => return None,
        }
        match std::mem::replace(&mut self.state, DetectorState::Idle) {
            DetectorState::Scanning { prior, .. } => Some(prior),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Cancel the current activity.
    ///
    /// An in-flight scan is signalled and [`finish_scan`](Self::finish_scan)
    /// will restore the prior state. A ready session is discarded.
    pub fn cancel(&mut self) {
        match &self.state {
            DetectorState::Scanning { token, .. } => {
                info!("cancelling conflict scan");
                token.cancel();
            }
            DetectorState::Ready(session) => {
                info!(session = %session.id, "discarding conflict session");
                self.state = DetectorState::Idle;
            }
            DetectorState::Idle => debug!("nothing to cancel"),
        }
    }

    /// Return to `Idle` unconditionally, cancelling any running scan.
    pub fn reset(&mut self) {
        if let DetectorState::Scanning { token, .. } = &self.state {
            token.cancel();
        }
        self.state = DetectorState::Idle;
        debug!("conflict detector reset");
    }

    /// Fail with [`ConflictError::Stale`] unless `file` is awaiting resolution.
    pub fn ensure_unresolved(&self, file: &ConflictFile) -> Result<(), ConflictError> {
        match &self.state {
            DetectorState::Ready(session) if session.contains(file) => Ok(()),
            DetectorState::Scanning { .. } => Err(ConflictError::ScanInProgress),
            _ => Err(ConflictError::Stale(file.file_name.clone())),
        }
    }

    /// Remove `file` from the session. The session is destroyed once empty.
    ///
    /// Returns the number of conflicts still unresolved.
    pub fn mark_resolved(&mut self, file: &ConflictFile) -> Result<usize, ConflictError> {
        let session = match &mut self.state {
            DetectorState::Ready(session) => session,
            DetectorState::Scanning { .. } => return Err(ConflictError::ScanInProgress),
            DetectorState::Idle => return Err(ConflictError::Stale(file.file_name.clone())),
        };

        session.mark_resolved(file)?;
        let remaining = session.unresolved_count();
        if remaining == 0 {
            info!(session = %session.id, "all conflicts resolved, closing session");
            self.state = DetectorState::Idle;
        }
        Ok(remaining)
    }
}
