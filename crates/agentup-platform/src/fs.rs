use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, trace};
use thiserror::Error;

/// Bounded attempt count with a fixed delay between attempts.
///
/// A retry loop sleeps at most `attempts * delay` in total; rollback code
/// relies on that bound fitting inside the update deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    #[must_use]
    pub fn worst_case(&self) -> Duration {
        self.delay * self.attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(30, Duration::from_millis(250))
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("rename failed after {attempts} attempts (from={} to={}): {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },
    #[error("remove failed after {attempts} attempts (path={}): {source}", .path.display())]
    Remove {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::Rename { source, .. } | FsError::Remove { source, .. } => source.kind(),
        }
    }
}

/// Rename `from` to `to`, retrying on any failure.
///
/// # Errors
/// Returns the last I/O error once `policy.attempts` attempts have failed.
pub async fn rename_with_retry(from: &Path, to: &Path, policy: RetryPolicy) -> Result<(), FsError> {
    let attempts = policy.attempts.max(1);
    let mut last = None;

    for attempt in 1..=attempts {
        match tokio::fs::rename(from, to).await {
            Ok(()) => {
                debug!("Renamed {} -> {}", from.display(), to.display());
                return Ok(());
            }
            Err(error) => {
                trace!(
                    "Rename {} -> {} attempt {attempt}/{attempts} failed: {error}",
                    from.display(),
                    to.display()
                );
                last = Some(error);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(FsError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        attempts,
        source: last.unwrap_or_else(|| io::Error::other("rename was not attempted")),
    })
}

/// Remove the file at `path`, retrying on failure. A missing file counts as
/// removed.
///
/// # Errors
/// Returns the last I/O error once `policy.attempts` attempts have failed.
pub async fn remove_with_retry(path: &Path, policy: RetryPolicy) -> Result<(), FsError> {
    let attempts = policy.attempts.max(1);
    let mut last = None;

    for attempt in 1..=attempts {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                return Ok(());
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(error) => {
                trace!(
                    "Remove {} attempt {attempt}/{attempts} failed: {error}",
                    path.display()
                );
                last = Some(error);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(FsError::Remove {
        path: path.to_path_buf(),
        attempts,
        source: last.unwrap_or_else(|| io::Error::other("remove was not attempted")),
    })
}
