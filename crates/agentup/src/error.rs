use agentup_core::UpdateError;
use thiserror::Error;

use crate::single_instance::AcquireError;

/// Exit status for failed updates.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for bad invocations and contended install directories.
pub const EXIT_USAGE: u8 = 2;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Lock(#[from] AcquireError),
    #[error("update failed at {}: {source}", .source.stage())]
    Update {
        #[from]
        source: UpdateError,
    },
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Lock(AcquireError::AlreadyHeld { .. }) => EXIT_USAGE,
            AppError::Lock(AcquireError::Io { .. }) | AppError::Update { .. } => EXIT_FAILURE,
        }
    }
}
