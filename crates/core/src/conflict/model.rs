//! Conflict data types shared by the detector, resolver, and view.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One file that differs between the local working copy and the remote
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictFile {
    /// Relative name (forward-slash separated), identical on both sides.
    pub file_name: String,
    /// Directory containing the local copy.
    pub local_path: PathBuf,
    /// Directory containing the remote copy.
    pub remote_path: PathBuf,
}

impl ConflictFile {
    pub fn new(
        file_name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        remote_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            local_path: local_path.into(),
            remote_path: remote_path.into(),
        }
    }

    /// Fully-qualified path of the local copy.
    pub fn local_file(&self) -> PathBuf {
        join_relative(&self.local_path, &self.file_name)
    }

    /// Fully-qualified path of the remote copy.
    pub fn remote_file(&self) -> PathBuf {
        join_relative(&self.remote_path, &self.file_name)
    }

    /// Last path component, used as the display label.
    pub fn label(&self) -> &str {
        self.file_name
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.file_name)
    }

    /// Relative parent directory, empty for top-level files.
    pub fn parent_dir(&self) -> &str {
        self.file_name
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }
}

fn join_relative(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Which side becomes authoritative for a conflicting file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the local copy; it overwrites the remote location.
    AcceptLocal,
    /// Take the remote copy; it overwrites the local file.
    AcceptRemote,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptLocal => write!(f, "accept_local"),
            Self::AcceptRemote => write!(f, "accept_remote"),
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "accept_local" | "accept-local" => Ok(Self::AcceptLocal),
            "remote" | "accept_remote" | "accept-remote" => Ok(Self::AcceptRemote),
            other => Err(format!(
                "invalid resolution '{}': use 'local' or 'remote'",
                other
            )),
        }
    }
}
