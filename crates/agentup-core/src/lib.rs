//! Self-update engine for a supervised agent binary.
//!
//! An [`Updater`] fetches a [`Manifest`], picks the artifact for the running
//! platform, downloads it next to the installed executable, verifies its
//! SHA-256 digest and hands the staged file to an [`Applier`]. Appliers stop
//! the service, swap the binaries with retrying renames, restart the service
//! and roll back when any step fails.

mod apply;
mod download;
mod journal;
mod manifest;
mod source;
pub mod swap;
mod updater;
pub mod verify;
pub mod version;

/// `User-Agent` sent with manifest and artifact requests by default.
pub const DEFAULT_USER_AGENT: &str = concat!("agentup/", env!("CARGO_PKG_VERSION"));

pub use apply::{
    Applier, ApplyError, DirectSwapApplier, HELPER_EXIT_START, HELPER_EXIT_SWAP, HelperApplier,
    default_applier,
};
pub use download::{
    DEFAULT_MIN_BYTES, DOWNLOAD_TIMEOUT, DownloadError, download, download_client, partial_path,
};
pub use journal::{DEFAULT_MAX_JOURNAL_SIZE, UpdateJournal};
pub use manifest::{Artifact, Manifest};
pub use source::{FileManifestSource, HttpManifestSource, ManifestSource, SourceError};
pub use swap::{SwapError, SwapPolicy, swap_binaries};
pub use updater::{CheckResult, UpdateError, UpdateResult, UpdateState, Updater, UpdaterConfig};
pub use verify::{VerifyError, verify_sha256};
