//! Asynchronous runner for external command-line tools.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::errors::ProcessError;

/// A program plus the fixed arguments placed before per-call arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv vector (`["sfdx", "force:source:deploy", "-p"]`).
    /// Returns `None` for an empty vector.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run with `extra` appended to the fixed arguments and return stdout.
    #[instrument(skip(self), fields(program = %self.program))]
    pub async fn run(&self, extra: &[&str]) -> Result<String, ProcessError> {
        self.run_in(None, extra).await
    }

    /// Like [`run`](Self::run) with an explicit working directory.
    pub async fn run_in(&self, dir: Option<&Path>, extra: &[&str]) -> Result<String, ProcessError> {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd.args(&self.args)
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(
            cmd = ?format!("{} {} {}", self.program, self.args.join(" "), extra.join(" ")),
            "running command"
        );
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::BinaryNotFound(self.program.clone())
            } else {
                ProcessError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "command failed");
            return Err(ProcessError::CommandFailed { exit_code, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
