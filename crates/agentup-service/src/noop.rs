use agentup_platform::Deadline;
use async_trait::async_trait;

use crate::error::ServiceError;
use crate::traits::ServiceController;

/// Used when no supervised process is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopController;

#[async_trait]
impl ServiceController for NoopController {
    fn name(&self) -> String {
        "noop".to_string()
    }

    async fn stop(&self, _deadline: Deadline) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn start(&self, _deadline: Deadline) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn restart(&self, _deadline: Deadline) -> Result<(), ServiceError> {
        Ok(())
    }
}
