//! forcesync core library.
//!
//! This crate provides the components behind the `forcesync` host adapter:
//! configuration, conflict detection and resolution between a local working
//! copy and a remote metadata snapshot, the command dispatch table, and
//! anonymous code execution against a remote org.

pub mod commands;
pub mod config;
pub mod conflict;
pub mod errors;
pub mod execute;
pub mod host;
pub mod process;
pub mod workflow;

// Re-exports for convenience.
pub use commands::{CommandId, CommandOutcome, CommandRegistry};
pub use config::AppConfig;
pub use errors::CoreError;
pub use host::Host;
pub use workflow::{ConflictWorkflow, DetectionSummary};
