//! Error types for the forcesync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from the conflict detection / resolution subsystem.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// A directory root (or an entry below it) could not be read during a scan.
    #[error("cannot read '{path}': {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The conflict is not part of the active session's unresolved set.
    #[error("conflict '{0}' is no longer part of the active session")]
    Stale(String),

    /// An operation required a session but none is active.
    #[error("no active conflict session")]
    NoActiveSession,

    /// A second scan was requested while one is still running.
    #[error("a conflict scan is already in progress")]
    ScanInProgress,

    /// The scan was cancelled before it completed.
    #[error("conflict scan cancelled")]
    Cancelled,

    /// Writing the chosen version to its destination failed.
    #[error("failed to write '{path}': {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The authoritative sync step for an accept-local resolution failed.
    #[error("sync command failed for '{file}': {source}")]
    SyncFailed {
        file: String,
        #[source]
        source: ProcessError,
    },

    /// "Perform" was triggered with no resolution operation configured.
    #[error("no resolution operation configured")]
    NoOperation,

    /// The host could not present a diff.
    #[error("diff presentation failed: {0}")]
    Presentation(String),

    /// The background scan task panicked or was aborted.
    #[error("conflict scan task failed: {0}")]
    TaskFailed(String),
}

// ---------------------------------------------------------------------------
// Execute errors
// ---------------------------------------------------------------------------

/// Errors from anonymous code execution.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Neither a file path nor inline code was supplied.
    #[error("nothing to execute: neither a file path nor inline code was provided")]
    NoInput,

    /// The file to execute is missing or not a regular file.
    #[error("invalid file to execute: {0}")]
    InvalidFile(String),

    /// The executor has no service to send the request to.
    #[error("execute service is not established")]
    ServiceNotEstablished,

    /// No root workspace is open.
    #[error("no root workspace is open")]
    NoWorkspace,

    /// The external CLI failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Generic I/O wrapper (temporary file handling).
    #[error("execute I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Process errors
// ---------------------------------------------------------------------------

/// Errors from running an external command-line tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The binary was not found on `$PATH`.
    #[error("binary not found: {0}")]
    BinaryNotFound(String),

    /// The command exited with a non-zero status.
    #[error("command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// Generic I/O wrapper.
    #[error("process I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Command dispatch errors
// ---------------------------------------------------------------------------

/// Errors from the command dispatch table.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No handler is registered under the identifier.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The command needs an argument that was not supplied.
    #[error("command '{command}' requires argument '{argument}'")]
    MissingArgument { command: String, argument: String },

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ConflictError::Stale("classes/Foo.cls".into());
        assert_eq!(
            err.to_string(),
            "conflict 'classes/Foo.cls' is no longer part of the active session"
        );

        let err = ConflictError::Filesystem {
            path: "/tmp/missing".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().starts_with("cannot read '/tmp/missing'"));

        let err = ProcessError::CommandFailed {
            exit_code: 2,
            stderr: "bad flag".into(),
        };
        assert_eq!(err.to_string(), "command failed (exit 2): bad flag");

        let err = CommandError::MissingArgument {
            command: "sfdx.force.conflict.diff".into(),
            argument: "entry".into(),
        };
        assert!(err.to_string().contains("entry"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = ConflictError::NoActiveSession.into();
        assert!(matches!(core_err, CoreError::Conflict(_)));

        let core_err: CoreError = ExecuteError::NoInput.into();
        assert!(matches!(core_err, CoreError::Execute(_)));

        let exec_err: ExecuteError = ProcessError::BinaryNotFound("sfdx".into()).into();
        assert!(matches!(exec_err, ExecuteError::Process(_)));
    }
}
