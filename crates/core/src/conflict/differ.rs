//! Structural comparison of two directory trees.
//!
//! [`CommonDirDirectoryDiffer`] walks a local root and a remote root, keys every
//! regular file by its forward-slash relative path, and partitions the union
//! into files only present locally, only present remotely, or present on both
//! sides with different content.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use crate::config::ComparisonStrategy;
use crate::errors::ConflictError;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Kind of difference for one relative path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present only in the local tree.
    Added,
    /// Present only in the remote tree.
    Removed,
    /// Present in both trees with differing content.
    Modified,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// Output of comparing a local tree against a remote tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDiffResults {
    pub local_root: PathBuf,
    pub remote_root: PathBuf,
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeSet<String>,
}

impl DirectoryDiffResults {
    pub fn new(local_root: impl Into<PathBuf>, remote_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root: remote_root.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of differing paths.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Change kind recorded for `path`, if any.
    pub fn kind_of(&self, path: &str) -> Option<ChangeKind> {
        if self.added.contains(path) {
            Some(ChangeKind::Added)
        } else if self.removed.contains(path) {
            Some(ChangeKind::Removed)
        } else if self.modified.contains(path) {
            Some(ChangeKind::Modified)
        } else {
            None
        }
    }

    /// All entries in path order.
    pub fn entries(&self) -> Vec<(&str, ChangeKind)> {
        let mut entries: Vec<(&str, ChangeKind)> = self
            .added
            .iter()
            .map(|p| (p.as_str(), ChangeKind::Added))
            .chain(self.removed.iter().map(|p| (p.as_str(), ChangeKind::Removed)))
            .chain(self.modified.iter().map(|p| (p.as_str(), ChangeKind::Modified)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

// ---------------------------------------------------------------------------
// Differ
// ---------------------------------------------------------------------------

/// Computes structural differences between two directory trees.
///
/// Implementations block on filesystem I/O and must return
/// [`ConflictError::Cancelled`] once `cancel` is signalled.
pub trait DirectoryDiffer: Send + Sync {
    fn diff(
        &self,
        local_root: &Path,
        remote_root: &Path,
        cancel: &CancelToken,
    ) -> Result<DirectoryDiffResults, ConflictError>;
}

/// Differ comparing every file common to both trees.
#[derive(Debug, Clone, Default)]
pub struct CommonDirDirectoryDiffer {
    strategy: ComparisonStrategy,
    ignore_patterns: Vec<String>,
}

impl CommonDirDirectoryDiffer {
    pub fn new(strategy: ComparisonStrategy, ignore_patterns: Vec<String>) -> Self {
        Self {
            strategy,
            ignore_patterns,
        }
    }

    fn is_ignored(&self, rel_path: &str) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| glob_match::glob_match(pattern, rel_path))
    }

    /// Collect `relative path -> size` for every regular file below `root`.
    fn collect_files(
        &self,
        root: &Path,
        cancel: &CancelToken,
    ) -> Result<BTreeMap<String, u64>, ConflictError> {
        let meta = std::fs::metadata(root).map_err(|e| fs_error(root, e))?;
        if !meta.is_dir() {
            return Err(fs_error(root, std::io::Error::other("not a directory")));
        }

        let mut files = BTreeMap::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = std::fs::read_dir(&dir).map_err(|e| fs_error(&dir, e))?;
            for entry in entries {
                if cancel.is_cancelled() {
                    return Err(ConflictError::Cancelled);
                }
                let entry = entry.map_err(|e| fs_error(&dir, e))?;
                let path = entry.path();
                // Follows symlinks so linked files compare by their target.
                let meta = std::fs::metadata(&path).map_err(|e| fs_error(&path, e))?;

                if meta.is_dir() {
                    pending.push(path);
                } else if meta.is_file() {
                    let Some(rel) = relative_key(root, &path) else {
                        warn!(path = %path.display(), "skipping file with a non UTF-8 name");
                        continue;
                    };
                    if self.is_ignored(&rel) {
                        debug!(path = %rel, "ignoring file");
                        continue;
                    }
                    files.insert(rel, meta.len());
                }
            }
        }

        Ok(files)
    }

    fn contents_differ(&self, local: &Path, remote: &Path) -> Result<bool, ConflictError> {
        match self.strategy {
            // Sizes were already found equal by the caller.
            ComparisonStrategy::Size => Ok(false),
            ComparisonStrategy::Content => Ok(file_digest(local)? != file_digest(remote)?),
        }
    }
}

impl DirectoryDiffer for CommonDirDirectoryDiffer {
    fn diff(
        &self,
        local_root: &Path,
        remote_root: &Path,
        cancel: &CancelToken,
    ) -> Result<DirectoryDiffResults, ConflictError> {
        info!(
            local = %local_root.display(),
            remote = %remote_root.display(),
            "comparing directory trees"
        );

        let local_files = self.collect_files(local_root, cancel)?;
        let remote_files = self.collect_files(remote_root, cancel)?;

        let mut results = DirectoryDiffResults::new(local_root, remote_root);

        for (rel, local_size) in &local_files {
            if cancel.is_cancelled() {
                return Err(ConflictError::Cancelled);
            }
            match remote_files.get(rel) {
                None => {
                    results.added.insert(rel.clone());
                }
                Some(remote_size) if remote_size != local_size => {
                    results.modified.insert(rel.clone());
                }
                Some(_) => {
                    let local = local_root.join(rel);
                    let remote = remote_root.join(rel);
                    if self.contents_differ(&local, &remote)? {
                        results.modified.insert(rel.clone());
                    }
                }
            }
        }

        for rel in remote_files.keys() {
            if !local_files.contains_key(rel) {
                results.removed.insert(rel.clone());
            }
        }

        info!(
            added = results.added.len(),
            removed = results.removed.len(),
            modified = results.modified.len(),
            "directory comparison complete"
        );
        Ok(results)
    }
}

/// Forward-slash key for `path` below `root`, or `None` when a component is
/// not valid UTF-8 and the key could not be joined back onto a root.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .map(|parts| parts.join("/"))
}

fn file_digest(path: &Path) -> Result<String, ConflictError> {
    let mut file = File::open(path).map_err(|e| fs_error(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| fs_error(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

fn fs_error(path: &Path, source: std::io::Error) -> ConflictError {
    warn!(path = %path.display(), error = %source, "filesystem error during scan");
    ConflictError::Filesystem {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn differ() -> CommonDirDirectoryDiffer {
        CommonDirDirectoryDiffer::new(ComparisonStrategy::Content, Vec::new())
    }

    #[test]
    fn test_identical_trees_are_empty() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        for root in [local.path(), remote.path()] {
            write(root, "classes/Foo.cls", "public class Foo {}");
            write(root, "objects/Account/Account.object-meta.xml", "<xml/>");
        }

        let results = differ()
            .diff(local.path(), remote.path(), &CancelToken::new())
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(results.len(), 0);
    }

    #[test]
    fn test_single_content_change_is_one_modified() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        write(local.path(), "foo.cls", "A");
        write(remote.path(), "foo.cls", "B");
        write(local.path(), "bar.cls", "same");
        write(remote.path(), "bar.cls", "same");

        let results = differ()
            .diff(local.path(), remote.path(), &CancelToken::new())
            .unwrap();
        assert_eq!(results.modified.len(), 1);
        assert!(results.modified.contains("foo.cls"));
        assert!(results.added.is_empty());
        assert!(results.removed.is_empty());
        assert_eq!(results.kind_of("foo.cls"), Some(ChangeKind::Modified));
    }

    #[test]
    fn test_added_and_removed() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        write(local.path(), "classes/OnlyLocal.cls", "x");
        write(remote.path(), "classes/OnlyRemote.cls", "y");

        let results = differ()
            .diff(local.path(), remote.path(), &CancelToken::new())
            .unwrap();
        assert_eq!(
            results.entries(),
            vec![
                ("classes/OnlyLocal.cls", ChangeKind::Added),
                ("classes/OnlyRemote.cls", ChangeKind::Removed),
            ]
        );
    }

    #[test]
    fn test_size_strategy_ignores_same_size_edits() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        write(local.path(), "a.txt", "abc");
        write(remote.path(), "a.txt", "xyz");
        write(local.path(), "b.txt", "short");
        write(remote.path(), "b.txt", "much longer");

        let results = CommonDirDirectoryDiffer::new(ComparisonStrategy::Size, Vec::new())
            .diff(local.path(), remote.path(), &CancelToken::new())
            .unwrap();
        assert_eq!(results.modified.iter().collect::<Vec<_>>(), vec!["b.txt"]);
    }

    #[test]
    fn test_ignore_patterns() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        write(local.path(), "classes/.DS_Store", "junk");
        write(local.path(), "classes/Foo.cls", "1");
        write(remote.path(), "classes/Foo.cls", "2");

        let results = CommonDirDirectoryDiffer::new(
            ComparisonStrategy::Content,
            vec!["**/.DS_Store".into()],
        )
        .diff(local.path(), remote.path(), &CancelToken::new())
        .unwrap();
        assert!(results.added.is_empty());
        assert!(results.modified.contains("classes/Foo.cls"));
    }

    #[test]
    fn test_missing_root_is_filesystem_error() {
        let remote = tempfile::tempdir().unwrap();
        let missing = remote.path().join("does-not-exist");
        let result = differ().diff(&missing, remote.path(), &CancelToken::new());
        assert!(matches!(result, Err(ConflictError::Filesystem { .. })));
    }

    #[test]
    fn test_file_root_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "plain.txt", "not a dir");
        let result = differ().diff(&dir.path().join("plain.txt"), dir.path(), &CancelToken::new());
        assert!(matches!(result, Err(ConflictError::Filesystem { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        let name = OsStr::from_bytes(b"bad\xffname.cls");
        std::fs::write(local.path().join(name), "A").unwrap();
        std::fs::write(remote.path().join(name), "B").unwrap();
        write(local.path(), "ok.cls", "1");
        write(remote.path(), "ok.cls", "2");

        assert_eq!(relative_key(local.path(), &local.path().join(name)), None);
        let results = differ()
            .diff(local.path(), remote.path(), &CancelToken::new())
            .unwrap();
        assert_eq!(results.modified.iter().collect::<Vec<_>>(), vec!["ok.cls"]);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_cancelled_scan() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        write(local.path(), "a.cls", "1");
        write(remote.path(), "a.cls", "2");

        let token = CancelToken::new();
        token.cancel();
        let result = differ().diff(local.path(), remote.path(), &token);
        assert!(matches!(result, Err(ConflictError::Cancelled)));
    }

    #[test]
    fn test_deterministic() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        for i in 0..10 {
            write(local.path(), &format!("dir{}/f{}.cls", i % 3, i), &format!("l{}", i));
            write(remote.path(), &format!("dir{}/f{}.cls", i % 3, i), &format!("r{}", i));
        }

        let first = differ()
            .diff(local.path(), remote.path(), &CancelToken::new())
            .unwrap();
        let second = differ()
            .diff(local.path(), remote.path(), &CancelToken::new())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.modified.len(), 10);
    }
}
