//! Side-by-side comparison requests for a single conflict.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::ConflictFile;
use crate::errors::ConflictError;

/// A two-way comparison the host should open. Remote is the left side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRequest {
    pub remote: PathBuf,
    pub local: PathBuf,
    pub title: String,
}

/// Compose the comparison for `file`. Pure; touches neither disk nor host.
pub fn diff_request(file: &ConflictFile) -> DiffRequest {
    DiffRequest {
        remote: file.remote_file(),
        local: file.local_file(),
        title: format!("REMOTE: {} ↔ LOCAL: {}", file.file_name, file.file_name),
    }
}

/// Host collaborator that opens comparison views.
pub trait DiffPresenter: Send + Sync {
    fn open_diff(&self, request: &DiffRequest) -> Result<(), ConflictError>;
}

/// Render `request` as a unified text diff (remote -> local).
pub fn unified_diff(request: &DiffRequest) -> Result<String, ConflictError> {
    let read = |path: &PathBuf| {
        std::fs::read_to_string(path).map_err(|e| ConflictError::Filesystem {
            path: path.display().to_string(),
            source: e,
        })
    };
    let remote = read(&request.remote)?;
    let local = read(&request.local)?;

    let patch = diffy::create_patch(&remote, &local);
    debug!(title = %request.title, hunks = patch.hunks().len(), "rendered unified diff");
    Ok(patch.to_string())
}
