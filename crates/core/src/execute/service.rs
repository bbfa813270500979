//! Remote anonymous-execution service.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use super::gatherer::ExecuteSource;
use crate::config::ExecuteConfig;
use crate::errors::ExecuteError;
use crate::process::CommandRunner;

/// Executes anonymous code against the remote runtime and returns its
/// textual output.
#[async_trait]
pub trait ExecuteService: Send + Sync {
    async fn execute_anonymous(&self, source: &ExecuteSource) -> Result<String, ExecuteError>;
}

/// [`ExecuteService`] backed by the platform CLI.
///
/// Inline code is staged in a temporary `.apex` file, since the CLI only
/// accepts a file path.
#[derive(Debug, Clone)]
pub struct CliExecuteService {
    runner: CommandRunner,
    file_flag: String,
    target_org_flag: String,
    target_org: Option<String>,
    working_dir: Option<PathBuf>,
}

impl CliExecuteService {
    pub fn new(config: &ExecuteConfig, working_dir: Option<PathBuf>) -> Self {
        Self {
            runner: CommandRunner::new(config.program.clone(), config.args.clone()),
            file_flag: config.file_flag.clone(),
            target_org_flag: config.target_org_flag.clone(),
            target_org: config.target_org.clone(),
            working_dir,
        }
    }

    async fn run_file(&self, path: &std::path::Path) -> Result<String, ExecuteError> {
        let path_str = path.to_string_lossy();
        let mut args: Vec<&str> = vec![self.file_flag.as_str(), path_str.as_ref()];
        if let Some(ref org) = self.target_org {
            args.push(self.target_org_flag.as_str());
            args.push(org.as_str());
        }
        let output = self
            .runner
            .run_in(self.working_dir.as_deref(), &args)
            .await?;
        Ok(output)
    }
}

#[async_trait]
impl ExecuteService for CliExecuteService {
    async fn execute_anonymous(&self, source: &ExecuteSource) -> Result<String, ExecuteError> {
        match source {
            ExecuteSource::File(path) => {
                if !path.is_file() {
                    return Err(ExecuteError::InvalidFile(path.display().to_string()));
                }
                info!(file = %path.display(), "executing anonymous code from file");
                self.run_file(path).await
            }
            ExecuteSource::Code(code) => {
                let mut staged = tempfile::Builder::new()
                    .prefix("forcesync-anon-")
                    .suffix(".apex")
                    .tempfile()?;
                staged.write_all(code.as_bytes())?;
                staged.flush()?;
                debug!(path = %staged.path().display(), bytes = code.len(), "staged inline code");
                info!("executing inline anonymous code");
                // `staged` is removed when dropped, after the CLI returns.
                self.run_file(staged.path()).await
            }
        }
    }
}
