//! Shared styling utilities for terminal output.

use console::Style;

use forcesync_core::conflict::{ChangeKind, Resolution};

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Colored label for a change kind.
pub fn change_kind(kind: ChangeKind) -> String {
    let style = match kind {
        ChangeKind::Added => Style::new().green(),
        ChangeKind::Removed => Style::new().red(),
        ChangeKind::Modified => Style::new().yellow().bold(),
    };
    style.apply_to(kind.to_string()).to_string()
}

/// Label for the side a resolution keeps.
pub fn resolution(resolution: Resolution) -> String {
    match resolution {
        Resolution::AcceptLocal => Style::new().green().bold().apply_to("local").to_string(),
        Resolution::AcceptRemote => Style::new().blue().bold().apply_to("remote").to_string(),
    }
}

/// One line of a unified diff, colored by its marker.
pub fn diff_line(line: &str) -> String {
    let style = if line.starts_with("+++") || line.starts_with("---") {
        Style::new().bold()
    } else if line.starts_with('+') {
        Style::new().green()
    } else if line.starts_with('-') {
        Style::new().red()
    } else if line.starts_with("@@") {
        Style::new().cyan()
    } else {
        Style::new()
    };
    style.apply_to(line).to_string()
}
