//! Navigable presentation of the current conflict set.
//!
//! The view only mirrors the session: [`ConflictView::render`] replaces its
//! node list from a snapshot, and selection/operation state is purely
//! presentational. Conflict data changes only through the resolution service.

use serde::Serialize;

use super::model::ConflictFile;
use super::strategy::ResolutionStrategy;

/// One row of the conflict list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictNode {
    /// File name without directories.
    pub label: String,
    /// Relative parent directory.
    pub description: String,
    pub file: ConflictFile,
}

#[derive(Debug, Default)]
pub struct ConflictView {
    nodes: Vec<ConflictNode>,
    selected: Option<usize>,
    operation: Option<ResolutionStrategy>,
}

impl ConflictView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rendered list. The selection follows the previously
    /// selected file when it is still present.
    pub fn render<'a>(&mut self, files: impl IntoIterator<Item = &'a ConflictFile>) {
        let previous = self.selected().map(|n| n.file.file_name.clone());

        self.nodes = files
            .into_iter()
            .map(|file| ConflictNode {
                label: file.label().to_string(),
                description: file.parent_dir().to_string(),
                file: file.clone(),
            })
            .collect();

        self.selected = previous
            .and_then(|name| self.nodes.iter().position(|n| n.file.file_name == name))
            .or(if self.nodes.is_empty() { None } else { Some(0) });

        // A single-file operation for a file that disappeared is dropped.
        let stale = matches!(
            &self.operation,
            Some(ResolutionStrategy::ResolveOne { file, .. })
                if !self.nodes.iter().any(|n| &n.file == file)
        );
        if stale {
            self.operation = None;
        }
    }

    pub fn nodes(&self) -> &[ConflictNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn title(&self) -> String {
        format!("Conflicts ({})", self.nodes.len())
    }

    pub fn empty_message(&self) -> &'static str {
        "No conflicts detected"
    }

    pub fn selected(&self) -> Option<&ConflictNode> {
        self.selected.and_then(|i| self.nodes.get(i))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Select by index. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> Option<&ConflictNode> {
        if index < self.nodes.len() {
            self.selected = Some(index);
        }
        self.selected()
    }

    pub fn select_by_name(&mut self, file_name: &str) -> Option<&ConflictNode> {
        let index = self.nodes.iter().position(|n| n.file.file_name == file_name)?;
        self.select(index)
    }

    /// Move down, wrapping to the top.
    pub fn select_next(&mut self) -> Option<&ConflictNode> {
        if self.nodes.is_empty() {
            return None;
        }
        let next = self.selected.map_or(0, |i| (i + 1) % self.nodes.len());
        self.select(next)
    }

    /// Move up, wrapping to the bottom.
    pub fn select_prev(&mut self) -> Option<&ConflictNode> {
        if self.nodes.is_empty() {
            return None;
        }
        let len = self.nodes.len();
        let prev = self.selected.map_or(len - 1, |i| (i + len - 1) % len);
        self.select(prev)
    }

    /// Configure what "perform" will run.
    pub fn set_operation(&mut self, operation: Option<ResolutionStrategy>) {
        self.operation = operation;
    }

    pub fn operation(&self) -> Option<&ResolutionStrategy> {
        self.operation.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::model::Resolution;

    fn files(names: &[&str]) -> Vec<ConflictFile> {
        names
            .iter()
            .map(|n| ConflictFile::new(*n, "/l", "/r"))
            .collect()
    }

    #[test]
    fn test_render_nodes() {
        let mut view = ConflictView::new();
        assert!(view.is_empty());
        assert!(view.selected().is_none());

        view.render(&files(&["classes/Foo.cls", "package.xml"]));
        assert_eq!(view.title(), "Conflicts (2)");
        assert_eq!(view.nodes()[0].label, "Foo.cls");
        assert_eq!(view.nodes()[0].description, "classes");
        assert_eq!(view.nodes()[1].description, "");
        assert_eq!(view.selected_index(), Some(0));
    }

    #[test]
    fn test_navigation_wraps() {
        let mut view = ConflictView::new();
        view.render(&files(&["a", "b", "c"]));
        assert_eq!(view.select_next().unwrap().label, "b");
        assert_eq!(view.select_next().unwrap().label, "c");
        assert_eq!(view.select_next().unwrap().label, "a");
        assert_eq!(view.select_prev().unwrap().label, "c");
        assert_eq!(view.select_by_name("b").unwrap().label, "b");
        assert!(view.select_by_name("zzz").is_none());
        assert_eq!(view.select(10).unwrap().label, "b");
    }

    #[test]
    fn test_selection_follows_file_across_render() {
        let mut view = ConflictView::new();
        view.render(&files(&["a", "b", "c"]));
        view.select_by_name("c");
        view.render(&files(&["b", "c"]));
        assert_eq!(view.selected().unwrap().label, "c");

        view.render(&files(&["b"]));
        assert_eq!(view.selected().unwrap().label, "b");

        view.render(&Vec::<ConflictFile>::new());
        assert!(view.selected().is_none());
    }

    #[test]
    fn test_stale_single_operation_is_dropped() {
        let mut view = ConflictView::new();
        let list = files(&["a", "b"]);
        view.render(&list);
        view.set_operation(Some(ResolutionStrategy::ResolveOne {
            file: list[0].clone(),
            resolution: Resolution::AcceptLocal,
        }));

        view.render(&list[1..]);
        assert!(view.operation().is_none());

        view.set_operation(Some(ResolutionStrategy::ResolveAll {
            resolution: Resolution::AcceptRemote,
        }));
        view.render(&Vec::<ConflictFile>::new());
        assert!(view.operation().is_some());
    }
}
