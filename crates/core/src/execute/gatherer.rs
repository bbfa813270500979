//! Editor state and the gatherer that turns it into an execution request.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ExecuteError;

// ---------------------------------------------------------------------------
// Editor model
// ---------------------------------------------------------------------------

/// Zero-based line / character position in a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// A text range. [`Selection::new`] orders the endpoints; a range built
/// directly (or deserialized) may be reversed and is read as if it were not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

impl Selection {
    pub fn new(a: Position, b: Position) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The selected text. Positions past the end of a line or of the
    /// document are clamped.
    pub fn extract(&self, text: &str) -> String {
        let a = byte_offset(text, self.start);
        let b = byte_offset(text, self.end);
        text[a.min(b)..a.max(b)].to_string()
    }
}

/// Parses `LINE:COL-LINE:COL` with one-based lines and columns, as shown by
/// editors.
impl FromStr for Selection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('-')
            .ok_or_else(|| format!("expected LINE:COL-LINE:COL, got '{}'", s))?;
        Ok(Self::new(parse_position(a)?, parse_position(b)?))
    }
}

fn parse_position(s: &str) -> Result<Position, String> {
    let (line, character) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:COL, got '{}'", s))?;
    let parse = |v: &str, what: &str| -> Result<usize, String> {
        let n: usize = v
            .parse()
            .map_err(|_| format!("invalid {} '{}'", what, v))?;
        n.checked_sub(1)
            .ok_or_else(|| format!("{} numbers start at 1", what))
    };
    Ok(Position::new(parse(line, "line")?, parse(character, "column")?))
}

fn byte_offset(text: &str, pos: Position) -> usize {
    let mut offset = 0;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        if index == pos.line {
            let content = line.strip_suffix('\n').unwrap_or(line);
            let within = content
                .char_indices()
                .nth(pos.character)
                .map_or(content.len(), |(i, _)| i);
            return offset + within;
        }
        offset += line.len();
    }
    text.len()
}

/// The document open in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    pub path: PathBuf,
    pub text: String,
    pub selection: Selection,
}

impl ActiveDocument {
    /// Open `path` from disk with an optional selection.
    pub fn load(path: impl Into<PathBuf>, selection: Option<Selection>) -> Result<Self, ExecuteError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ExecuteError::InvalidFile(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            path,
            text,
            selection: selection.unwrap_or_default(),
        })
    }
}

/// What the host editor currently shows.
#[derive(Debug, Clone, Default)]
pub struct EditorState {
    pub workspace_root: Option<PathBuf>,
    pub active_document: Option<ActiveDocument>,
}

impl EditorState {
    pub fn has_root_workspace(&self) -> bool {
        self.workspace_root.as_deref().is_some_and(Path::is_dir)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Input for one anonymous execution. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub file_path: Option<PathBuf>,
    pub code: Option<String>,
}

/// The resolved thing to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteSource {
    File(PathBuf),
    Code(String),
}

impl ExecuteRequest {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: Some(path.into()),
            code: None,
        }
    }

    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            file_path: None,
            code: Some(code.into()),
        }
    }

    /// Inline code wins over a file path when both are present.
    pub fn source(&self) -> Result<ExecuteSource, ExecuteError> {
        if let Some(code) = self.code.as_deref().filter(|c| !c.is_empty()) {
            return Ok(ExecuteSource::Code(code.to_string()));
        }
        match self.file_path.as_ref() {
            Some(path) if !path.as_os_str().is_empty() => Ok(ExecuteSource::File(path.clone())),
            _ => Err(ExecuteError::NoInput),
        }
    }
}

/// Outcome of a gatherer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gathered<T> {
    Cancel,
    Continue(T),
}

// ---------------------------------------------------------------------------
// Gatherer & checker
// ---------------------------------------------------------------------------

/// Chooses what to execute from the editor: the selection when there is one,
/// otherwise the whole active file.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousCodeGatherer;

impl AnonymousCodeGatherer {
    pub fn gather(&self, editor: &EditorState) -> Gathered<ExecuteRequest> {
        if !editor.has_root_workspace() {
            debug!("no root workspace, cancelling");
            return Gathered::Cancel;
        }
        let Some(document) = editor.active_document.as_ref() else {
            debug!("no active editor, cancelling");
            return Gathered::Cancel;
        };

        if !document.selection.is_empty() {
            return Gathered::Continue(ExecuteRequest::from_code(
                document.selection.extract(&document.text),
            ));
        }
        Gathered::Continue(ExecuteRequest::from_file(document.path.clone()))
    }
}

/// Precondition check run before gathering.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceChecker;

impl WorkspaceChecker {
    pub fn check(&self, editor: &EditorState) -> Result<(), ExecuteError> {
        if editor.has_root_workspace() {
            Ok(())
        } else {
            Err(ExecuteError::NoWorkspace)
        }
    }
}
