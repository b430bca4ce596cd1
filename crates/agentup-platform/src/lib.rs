//! Platform primitives shared by the updater crates.
//!
//! Everything here is selected at runtime rather than with `cfg` gates so the
//! same code paths can be exercised on every host:
//! - Runtime OS/architecture detection in the manifest's naming scheme.
//! - Staging path derivation for the new and backup executables.
//! - Retry-backed rename/remove for files that may be briefly locked.
//! - A single deadline type propagated to every suspension point.
//! - Subprocess helpers (window hiding, deadline-bounded execution).

mod commands;
mod deadline;
mod fs;
mod paths;
mod platform;

pub use commands::{CommandError, HideWindow, run_bounded};
pub use deadline::{Deadline, DeadlineExceeded};
pub use fs::{FsError, RetryPolicy, remove_with_retry, rename_with_retry};
pub use paths::{StagingPaths, helper_executable_name};
pub use platform::{Arch, Os, Platform};
