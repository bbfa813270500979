//! The state of one detect-then-resolve workflow.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::differ::DirectoryDiffResults;
use super::model::ConflictFile;
use crate::errors::ConflictError;

/// A detection result together with the conflicts still awaiting resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub diff: DirectoryDiffResults,
    unresolved: BTreeMap<String, ConflictFile>,
}

impl ConflictSession {
    /// Build a session from a directory comparison. Every path modified on
    /// both sides becomes one unresolved [`ConflictFile`].
    pub fn from_diff(diff: DirectoryDiffResults) -> Self {
        let unresolved = diff
            .modified
            .iter()
            .map(|rel| {
                (
                    rel.clone(),
                    ConflictFile::new(rel.clone(), &diff.local_root, &diff.remote_root),
                )
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            diff,
            unresolved,
        }
    }

    /// Unresolved conflicts in file-name order.
    pub fn unresolved(&self) -> impl Iterator<Item = &ConflictFile> {
        self.unresolved.values()
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    /// `true` if `file` is an unresolved entry of this session, roots included.
    pub fn contains(&self, file: &ConflictFile) -> bool {
        self.unresolved.get(&file.file_name) == Some(file)
    }

    /// Look up an unresolved conflict by its relative name.
    pub fn find(&self, file_name: &str) -> Option<&ConflictFile> {
        self.unresolved.get(file_name)
    }

    /// Remove `file` from the unresolved set.
    pub fn mark_resolved(&mut self, file: &ConflictFile) -> Result<(), ConflictError> {
        if !self.contains(file) {
            return Err(ConflictError::Stale(file.file_name.clone()));
        }
        self.unresolved.remove(&file.file_name);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_with(modified: &[&str]) -> DirectoryDiffResults {
        let mut diff = DirectoryDiffResults::new("/local", "/remote");
        diff.modified = modified.iter().map(|s| s.to_string()).collect();
        diff.added.insert("only_local.cls".into());
        diff
    }

    #[test]
    fn test_only_modified_paths_become_conflicts() {
        let session = ConflictSession::from_diff(diff_with(&["b.cls", "a.cls"]));
        let names: Vec<&str> = session.unresolved().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.cls", "b.cls"]);
        assert!(session.find("only_local.cls").is_none());
    }

    #[test]
    fn test_sessions_get_fresh_v4_ids() {
        let a = ConflictSession::from_diff(diff_with(&["a.cls"]));
        let b = ConflictSession::from_diff(diff_with(&["a.cls"]));
        assert_eq!(a.id.get_version_num(), 4);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_mark_resolved() {
        let mut session = ConflictSession::from_diff(diff_with(&["a.cls"]));
        let file = session.find("a.cls").cloned().unwrap();
        session.mark_resolved(&file).unwrap();
        assert!(session.is_complete());

        let again = session.mark_resolved(&file);
        assert!(matches!(again, Err(ConflictError::Stale(ref n)) if n == "a.cls"));
    }

    #[test]
    fn test_contains_compares_roots() {
        let session = ConflictSession::from_diff(diff_with(&["a.cls"]));
        let other_roots = ConflictFile::new("a.cls", "/elsewhere", "/remote");
        assert!(!session.contains(&other_roots));
        assert!(session.contains(&ConflictFile::new("a.cls", "/local", "/remote")));
    }
}
