//! The stop, rename, start sequence shared by the in-process applier and
//! the `agentup-helper` binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use agentup_platform::{
    Deadline, FsError, RetryPolicy, StagingPaths, remove_with_retry, rename_with_retry,
};
use agentup_service::{ServiceController, ServiceError};
use log::{info, warn};
use thiserror::Error;

/// Extra time granted to rollback service commands once the update deadline
/// has already passed.
const ROLLBACK_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPolicy {
    /// Backup removal and `current -> old`.
    pub ordinary: RetryPolicy,
    /// `new -> current` and its rollback.
    pub critical: RetryPolicy,
    /// Pause after stopping the service so the OS releases the executable.
    pub stop_settle: Duration,
}

impl Default for SwapPolicy {
    fn default() -> Self {
        Self {
            ordinary: RetryPolicy::new(30, Duration::from_millis(250)),
            critical: RetryPolicy::new(40, Duration::from_millis(250)),
            stop_settle: Duration::from_millis(800),
        }
    }
}

impl SwapPolicy {
    #[must_use]
    pub fn with_stop_settle(mut self, stop_settle: Duration) -> Self {
        self.stop_settle = stop_settle;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.ordinary.delay = delay;
        self.critical.delay = delay;
        self
    }
}

#[derive(Debug, Error)]
pub enum SwapError {
    /// A rename failed; the previous binary is back in place.
    #[error("swap failed and was rolled back: {0}")]
    Swap(#[source] FsError),
    /// The new binary is in place but the service did not come up; the
    /// previous binary was restored.
    #[error("service start failed and the previous binary was restored: {0}")]
    Start(#[source] ServiceError),
}

/// Replace `paths.current` with `paths.new`, keeping the previous binary at
/// `paths.old`.
///
/// Returns the backup path on success.
///
/// # Errors
/// Returns [`SwapError::Swap`] when a rename fails and [`SwapError::Start`]
/// when the service refuses to start on the new binary. Both cases roll back
/// before returning.
pub async fn swap_binaries(
    controller: &dyn ServiceController,
    paths: &StagingPaths,
    policy: &SwapPolicy,
    deadline: Deadline,
) -> Result<PathBuf, SwapError> {
    let service = controller.name();

    info!("Stopping {service}");
    if let Err(error) = controller.stop(deadline).await {
        warn!("Ignoring stop failure for {service}: {error}");
    }
    tokio::time::sleep(policy.stop_settle).await;

    if let Err(error) = remove_with_retry(&paths.old, policy.ordinary).await {
        warn!("Could not remove previous backup: {error}");
    }

    let had_current = exists(&paths.current).await;
    if had_current
        && let Err(error) = rename_with_retry(&paths.current, &paths.old, policy.ordinary).await
    {
        warn!("Could not move the running binary aside: {error}");
        start_best_effort(controller, deadline).await;
        return Err(SwapError::Swap(error));
    }

    if let Err(error) = rename_with_retry(&paths.new, &paths.current, policy.critical).await {
        warn!("Could not move the new binary into place: {error}");
        if had_current {
            restore_backup(paths, policy.critical).await;
        }
        start_best_effort(controller, deadline).await;
        return Err(SwapError::Swap(error));
    }

    info!("Starting {service}");
    if let Err(error) = controller.start(deadline).await {
        warn!("{service} did not start on the new binary, rolling back: {error}");
        let deadline = rollback_deadline(deadline);
        if let Err(stop_error) = controller.stop(deadline).await {
            warn!("Ignoring stop failure during rollback: {stop_error}");
        }
        if had_current {
            if let Err(remove_error) = remove_with_retry(&paths.current, policy.ordinary).await {
                warn!("Could not remove the rejected binary: {remove_error}");
            }
            restore_backup(paths, policy.critical).await;
        } else {
            warn!("No previous binary to restore; keeping {}", paths.current.display());
        }
        start_best_effort(controller, deadline).await;
        return Err(SwapError::Start(error));
    }

    info!("Swap complete, previous binary kept at {}", paths.old.display());
    Ok(paths.old.clone())
}

async fn restore_backup(paths: &StagingPaths, policy: RetryPolicy) {
    match rename_with_retry(&paths.old, &paths.current, policy).await {
        Ok(()) => info!("Restored previous binary to {}", paths.current.display()),
        Err(error) => warn!("Rollback rename failed: {error}"),
    }
}

async fn start_best_effort(controller: &dyn ServiceController, deadline: Deadline) {
    if let Err(error) = controller.start(rollback_deadline(deadline)).await {
        warn!("Best-effort start of {} failed: {error}", controller.name());
    }
}

fn rollback_deadline(deadline: Deadline) -> Deadline {
    if deadline.is_expired() {
        Deadline::after(ROLLBACK_GRACE)
    } else {
        deadline
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
