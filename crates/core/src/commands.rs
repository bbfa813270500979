//! Dispatch table binding host command identifiers to workflow actions.
//!
//! The registry is built once at startup and handed to the host adapter,
//! which forwards every invocation through [`CommandRegistry::dispatch`].

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::conflict::diff::DiffRequest;
use crate::conflict::model::ConflictFile;
use crate::conflict::resolver::ResolutionOutcome;
use crate::conflict::strategy::ResolutionReport;
use crate::errors::CommandError;
use crate::workflow::ConflictWorkflow;

pub const CONFLICT_DIFF: &str = "sfdx.force.conflict.diff";
pub const CONFLICT_PERFORM: &str = "sfdx.force.conflict.perform";
pub const CONFLICT_CANCEL: &str = "sfdx.force.conflict.cancel";
pub const CONFLICT_ACCEPT_REMOTE: &str = "sfdx.force.conflict.acceptRemote";
pub const CONFLICT_ACCEPT_LOCAL: &str = "sfdx.force.conflict.acceptLocal";

/// Conflict commands understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CommandId {
    Diff,
    Perform,
    Cancel,
    AcceptRemote,
    AcceptLocal,
}

impl CommandId {
    pub const ALL: [CommandId; 5] = [
        Self::Diff,
        Self::Perform,
        Self::Cancel,
        Self::AcceptRemote,
        Self::AcceptLocal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diff => CONFLICT_DIFF,
            Self::Perform => CONFLICT_PERFORM,
            Self::Cancel => CONFLICT_CANCEL,
            Self::AcceptRemote => CONFLICT_ACCEPT_REMOTE,
            Self::AcceptLocal => CONFLICT_ACCEPT_LOCAL,
        }
    }

    /// Whether the command acts on a selected conflict entry.
    pub fn takes_entry(&self) -> bool {
        matches!(self, Self::Diff | Self::AcceptRemote | Self::AcceptLocal)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Diff => "Open a side-by-side diff of a conflict",
            Self::Perform => "Run the configured resolution operation",
            Self::Cancel => "Cancel the current conflict operation",
            Self::AcceptRemote => "Overwrite the local file with the remote version",
            Self::AcceptLocal => "Overwrite the remote file with the local version",
        }
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dispatched command did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    DiffOpened(DiffRequest),
    Performed(ResolutionReport),
    Cancelled,
    Resolved(ResolutionOutcome),
}

#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, CommandId>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        let commands = CommandId::ALL
            .iter()
            .map(|id| (id.as_str(), *id))
            .collect();
        Self { commands }
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    pub fn lookup(&self, id: &str) -> Result<CommandId, CommandError> {
        self.commands
            .get(id)
            .copied()
            .ok_or_else(|| CommandError::UnknownCommand(id.to_string()))
    }

    /// Invoke the handler registered for `id`.
    ///
    /// `entry` is the conflict the host had selected; commands that act on a
    /// single conflict fail with [`CommandError::MissingArgument`] without it.
    pub async fn dispatch(
        &self,
        workflow: &ConflictWorkflow,
        id: &str,
        entry: Option<&ConflictFile>,
    ) -> Result<CommandOutcome, CommandError> {
        let command = self.lookup(id)?;
        let entry = if command.takes_entry() {
            Some(entry.ok_or_else(|| CommandError::MissingArgument {
                command: id.to_string(),
                argument: "entry".into(),
            })?)
        } else {
            None
        };
        debug!(%command, entry = ?entry.map(|e| &e.file_name), "dispatching command");

        let started = Instant::now();
        let outcome = match (command, entry) {
            (CommandId::Diff, Some(file)) => CommandOutcome::DiffOpened(workflow.show_diff(file)?),
            (CommandId::AcceptRemote, Some(file)) => {
                CommandOutcome::Resolved(workflow.accept_remote(file).await?)
            }
            (CommandId::AcceptLocal, Some(file)) => {
                CommandOutcome::Resolved(workflow.accept_local(file).await?)
            }
            (CommandId::Perform, _) => {
                info!("performing operation");
                CommandOutcome::Performed(workflow.perform_configured().await?)
            }
            (CommandId::Cancel, _) => {
                info!("cancelled operation");
                workflow.cancel();
                CommandOutcome::Cancelled
            }
            (_, None) => {
                return Err(CommandError::MissingArgument {
                    command: id.to_string(),
                    argument: "entry".into(),
                })
            }
        };

        workflow
            .host()
            .telemetry
            .send_command_event(command.as_str(), started.elapsed());
        Ok(outcome)
    }
}
