//! Conflict resolution actions.
//!
//! [`ConflictResolutionService`] makes one side authoritative for a single
//! conflicting file. Resolutions are serialized per file, checked against the
//! active session before anything is written, and applied with an atomic
//! replace so the destination is either fully updated or left untouched.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use super::detector::{lock_detector, SharedDetector};
use super::model::{ConflictFile, Resolution};
use crate::errors::ConflictError;
use crate::process::CommandRunner;

/// Result of one successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub file_name: String,
    pub resolution: Resolution,
    /// Conflicts still unresolved in the session afterwards.
    pub remaining: usize,
}

/// Applies accept-local / accept-remote resolutions.
pub struct ConflictResolutionService {
    detector: SharedDetector,
    sync_command: Option<CommandRunner>,
    file_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConflictResolutionService {
    pub fn new(detector: SharedDetector, sync_command: Option<CommandRunner>) -> Self {
        Self {
            detector,
            sync_command,
            file_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Keep the local copy: it overwrites the remote location.
    ///
    /// When a sync command is configured it runs first with the local file
    /// path appended; a failing command rejects the resolution.
    pub async fn accept_local(
        &self,
        file: &ConflictFile,
    ) -> Result<ResolutionOutcome, ConflictError> {
        info!(file = %file.file_name, "resolving conflict: accept local");
        self.resolve(file, Resolution::AcceptLocal).await
    }

    /// Take the remote copy: it overwrites the local file.
    pub async fn accept_remote(
        &self,
        file: &ConflictFile,
    ) -> Result<ResolutionOutcome, ConflictError> {
        info!(file = %file.file_name, "resolving conflict: accept remote");
        self.resolve(file, Resolution::AcceptRemote).await
    }

    /// Apply `resolution` to `file`, serialized with any other resolution of
    /// the same file.
    pub async fn resolve(
        &self,
        file: &ConflictFile,
        resolution: Resolution,
    ) -> Result<ResolutionOutcome, ConflictError> {
        let guard = self.lock_file(&file.file_name).await;
        let result = self.resolve_locked(file, resolution).await;
        drop(guard);
        self.release_lock(&file.file_name);
        result
    }

    async fn resolve_locked(
        &self,
        file: &ConflictFile,
        resolution: Resolution,
    ) -> Result<ResolutionOutcome, ConflictError> {
        lock_detector(&self.detector).ensure_unresolved(file)?;

        if resolution == Resolution::AcceptLocal {
            self.run_sync_command(file).await?;
        }

        let (source, destination) = match resolution {
            Resolution::AcceptLocal => (file.local_file(), file.remote_file()),
            Resolution::AcceptRemote => (file.remote_file(), file.local_file()),
        };

        // The session may have changed while the sync command ran. Hold the
        // detector across the write so no cancel or rescan slips in between.
        let remaining = {
            let mut detector = lock_detector(&self.detector);
            detector.ensure_unresolved(file)?;
            replace_file(&source, &destination)?;
            detector.mark_resolved(file)?
        };

        info!(file = %file.file_name, %resolution, remaining, "conflict resolved");
        Ok(ResolutionOutcome {
            file_name: file.file_name.clone(),
            resolution,
            remaining,
        })
    }

    /// Acquire the per-file lock so two resolutions of the same file never
    /// interleave.
    async fn lock_file(&self, file_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .file_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(file_name.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    fn release_lock(&self, file_name: &str) {
        let mut locks = self
            .file_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only drop the entry when no other task holds or awaits it.
        if locks
            .get(file_name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(file_name);
        }
    }

    async fn run_sync_command(&self, file: &ConflictFile) -> Result<(), ConflictError> {
        let Some(ref runner) = self.sync_command else {
            return Ok(());
        };
        let local = file.local_file();
        let local_str = local.to_string_lossy();
        debug!(file = %file.file_name, program = runner.program(), "running sync command");
        runner
            .run(&[local_str.as_ref()])
            .await
            .map_err(|source| ConflictError::SyncFailed {
                file: file.file_name.clone(),
                source,
            })?;
        Ok(())
    }
}

/// Atomically replace `destination` with the content of `source`.
///
/// The content is staged in a temporary file in the destination directory and
/// renamed over the destination, so readers never observe a partial write.
fn replace_file(source: &Path, destination: &Path) -> Result<(), ConflictError> {
    let write_err = |source: std::io::Error| ConflictError::WriteFailed {
        path: destination.display().to_string(),
        source,
    };

    let mut input = std::fs::File::open(source).map_err(|e| ConflictError::Filesystem {
        path: source.display().to_string(),
        source: e,
    })?;
    let dir = destination
        .parent()
        .ok_or_else(|| write_err(std::io::Error::other("destination has no parent directory")))?;

    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    std::io::copy(&mut input, staged.as_file_mut()).map_err(write_err)?;
    staged.flush().map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;
    staged
        .persist(destination)
        .map_err(|e| write_err(e.error))?;

    debug!(
        from = %source.display(),
        to = %destination.display(),
        "replaced file"
    );
    Ok(())
}
