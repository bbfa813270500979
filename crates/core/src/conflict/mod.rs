//! Conflict detection, presentation, and resolution.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- comparing the local working copy against a remote
//!    snapshot and opening a session of conflicting files.
//! 2. **Presentation** -- a navigable list of the session and two-way diffs.
//! 3. **Resolution** -- making one side authoritative for a file.

pub mod cancel;
pub mod detector;
pub mod diff;
pub mod differ;
pub mod model;
pub mod resolver;
pub mod session;
pub mod strategy;
pub mod view;

pub use cancel::CancelToken;
pub use detector::{ConflictDetector, DetectorStatus, SharedDetector};
pub use diff::{diff_request, unified_diff, DiffPresenter, DiffRequest};
pub use differ::{ChangeKind, CommonDirDirectoryDiffer, DirectoryDiffResults, DirectoryDiffer};
pub use model::{ConflictFile, Resolution};
pub use resolver::{ConflictResolutionService, ResolutionOutcome};
pub use session::ConflictSession;
pub use strategy::{ResolutionReport, ResolutionStrategy};
pub use view::{ConflictNode, ConflictView};
