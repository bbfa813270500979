//! `forcesync execute`: run anonymous code against the target org.

use std::path::PathBuf;

use anyhow::{Context, Result};

use forcesync_core::execute::{
    ActiveDocument, Commandlet, EditorState, Position, RunOutcome, Selection,
};
use forcesync_core::{AppConfig, Host};

use crate::style;

/// Build the editor state the command line describes.
///
/// `--code` behaves like a document whose whole text is selected; `--file`
/// opens the file as the active document with the optional selection.
pub fn editor_state(
    config: &AppConfig,
    file: Option<PathBuf>,
    code: Option<String>,
    selection: Option<Selection>,
) -> Result<EditorState> {
    let active_document = match (file, code) {
        (_, Some(code)) => Some(ActiveDocument {
            path: PathBuf::from("<inline>"),
            text: code,
            selection: Selection::new(Position::new(0, 0), Position::new(usize::MAX, 0)),
        }),
        (Some(path), None) => Some(
            ActiveDocument::load(&path, selection)
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        (None, None) => None,
    };

    Ok(EditorState {
        workspace_root: Some(config.workspace.root.clone()),
        active_document,
    })
}

pub async fn run(
    config: &AppConfig,
    host: Host,
    file: Option<PathBuf>,
    code: Option<String>,
    selection: Option<Selection>,
) -> Result<()> {
    let editor = editor_state(config, file, code, selection)?;
    if editor.active_document.is_none() {
        println!("{}", style::warn("Nothing to execute: pass --file or --code"));
        return Ok(());
    }

    let commandlet = Commandlet::anonymous_execute(config, host);
    match commandlet.run(&editor).await {
        RunOutcome::Completed(outcome) => {
            println!(
                "{}",
                style::dim(&format!("finished in {} ms", outcome.duration.as_millis()))
            );
            Ok(())
        }
        RunOutcome::Cancelled => {
            println!("{}", style::warn("Execution cancelled"));
            Ok(())
        }
        RunOutcome::Failed => anyhow::bail!("anonymous execution failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forcesync_core::execute::{AnonymousCodeGatherer, ExecuteRequest, Gathered};

    #[test]
    fn test_inline_code_selects_everything() {
        let config = AppConfig::default();
        let editor = editor_state(&config, None, Some("System.debug(1);\nx();".into()), None)
            .unwrap();
        assert_eq!(
            AnonymousCodeGatherer.gather(&editor),
            Gathered::Continue(ExecuteRequest::from_code("System.debug(1);\nx();"))
        );
    }

    #[test]
    fn test_file_with_and_without_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.apex");
        std::fs::write(&path, "Integer i = 0;\n").unwrap();
        let mut config = AppConfig::default();
        config.workspace.root = dir.path().to_path_buf();

        let editor = editor_state(&config, Some(path.clone()), None, None).unwrap();
        assert_eq!(
            AnonymousCodeGatherer.gather(&editor),
            Gathered::Continue(ExecuteRequest::from_file(path.clone()))
        );

        let editor =
            editor_state(&config, Some(path), None, Some("1:1-1:8".parse().unwrap())).unwrap();
        assert_eq!(
            AnonymousCodeGatherer.gather(&editor),
            Gathered::Continue(ExecuteRequest::from_code("Integer"))
        );
    }

    #[test]
    fn test_missing_file_fails() {
        let config = AppConfig::default();
        assert!(editor_state(&config, Some("/nonexistent/a.apex".into()), None, None).is_err());
    }
}
