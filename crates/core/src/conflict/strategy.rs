//! Resolution strategies run by the "perform" operation.

use serde::{Deserialize, Serialize};

use super::model::{ConflictFile, Resolution};

/// What "perform" does with the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Resolve a single conflict.
    ResolveOne {
        file: ConflictFile,
        resolution: Resolution,
    },
    /// Resolve every unresolved conflict the same way.
    ResolveAll { resolution: Resolution },
}

impl ResolutionStrategy {
    pub fn resolution(&self) -> Resolution {
        match self {
            Self::ResolveOne { resolution, .. } | Self::ResolveAll { resolution } => *resolution,
        }
    }
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolveOne { file, resolution } => {
                write!(f, "{} {}", resolution, file.file_name)
            }
            Self::ResolveAll { resolution } => write!(f, "{} (all)", resolution),
        }
    }
}

/// Summary of a perform run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Files resolved, in order.
    pub resolved: Vec<String>,
    /// Files that failed, with the error message.
    pub failed: Vec<(String, String)>,
    /// Conflicts still unresolved afterwards.
    pub remaining: usize,
}

impl ResolutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
