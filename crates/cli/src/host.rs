//! Terminal implementations of the host collaborators.

use std::time::Duration;

use tracing::debug;

use forcesync_core::conflict::{unified_diff, DiffPresenter, DiffRequest};
use forcesync_core::errors::ConflictError;
use forcesync_core::host::{Notifier, OutputChannel, Telemetry};

use crate::style;

/// Notifications go to stderr so stdout stays machine-readable; output-channel
/// lines go to stdout. Telemetry only goes to the log.
#[derive(Debug, Default)]
pub struct ConsoleHost;

impl Notifier for ConsoleHost {
    fn show_info(&self, message: &str) {
        eprintln!("{}", style::success(message));
    }

    fn show_error(&self, message: &str) {
        eprintln!("{}", style::error(message));
    }

    fn show_failed_execution(&self, execution_name: &str) {
        eprintln!("{}", style::error(&format!("{} failed to run", execution_name)));
    }
}

impl Telemetry for ConsoleHost {
    fn send_exception(&self, name: &str, message: &str) {
        debug!(name, message, "telemetry exception");
    }

    fn send_command_event(&self, name: &str, duration: Duration) {
        debug!(name, duration_ms = duration.as_millis() as u64, "telemetry command");
    }
}

impl OutputChannel for ConsoleHost {
    fn append_line(&self, line: &str) {
        println!("{}", line);
    }
}

/// Prints a colored unified diff in place of a side-by-side view.
#[derive(Debug, Default)]
pub struct TerminalDiffPresenter;

impl DiffPresenter for TerminalDiffPresenter {
    fn open_diff(&self, request: &DiffRequest) -> Result<(), ConflictError> {
        let patch = unified_diff(request)?;
        println!();
        println!("{}", style::header(&request.title));
        println!("{}", style::dim(&format!("--- {}", request.remote.display())));
        println!("{}", style::dim(&format!("+++ {}", request.local.display())));
        if patch.lines().all(|l| l.starts_with("---") || l.starts_with("+++")) {
            println!("{}", style::dim("(contents are identical)"));
        }
        for line in patch
            .lines()
            .filter(|l| !l.starts_with("---") && !l.starts_with("+++"))
        {
            println!("{}", style::diff_line(line));
        }
        println!();
        Ok(())
    }
}
