use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

/// Hard cutoff shared by every suspension point of one update attempt.
///
/// Operations bounded by a deadline fail with [`DeadlineExceeded`] instead of
/// being dropped silently, so callers in a critical section still get to run
/// their rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    #[must_use]
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    #[must_use]
    pub fn instant(&self) -> Instant {
        self.at
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `future` until it completes or the deadline passes.
    ///
    /// # Errors
    /// Returns [`DeadlineExceeded`] when the deadline elapses first; the
    /// future is dropped in that case.
    pub async fn run<F>(self, future: F) -> Result<F::Output, DeadlineExceeded>
    where
        F: Future,
    {
        tokio::time::timeout_at(self.at, future)
            .await
            .map_err(|_| DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Deadline, DeadlineExceeded};

    #[tokio::test]
    async fn run_returns_output_before_deadline() {
        let deadline = Deadline::after(Duration::from_secs(5));

        let value = deadline.run(async { 7 }).await;

        assert_eq!(value, Ok(7));
        assert!(!deadline.is_expired());
    }

    #[tokio::test]
    async fn run_fails_once_deadline_passes() {
        let deadline = Deadline::after(Duration::from_millis(10));

        let result = deadline
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;

        assert_eq!(result, Err(DeadlineExceeded));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn expired_deadline_rejects_immediately() {
        let deadline = Deadline::after(Duration::ZERO);

        let result = deadline
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await;

        assert_eq!(result, Err(DeadlineExceeded));
    }
}
