use std::path::PathBuf;

use agentup_platform::Deadline;
use async_trait::async_trait;

use crate::error::ServiceError;
use crate::manager::ManagerCommand;
use crate::traits::ServiceController;

const SYSTEMCTL: &str = "systemctl";

#[derive(Debug, Clone)]
pub struct SystemdController {
    unit: String,
    command: ManagerCommand,
}

impl SystemdController {
    #[must_use]
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            command: ManagerCommand::new("systemd", SYSTEMCTL),
        }
    }

    /// Use a different `systemctl` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.command.program = program.into();
        self
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }
}

#[async_trait]
impl ServiceController for SystemdController {
    fn name(&self) -> String {
        format!("systemd:{}", self.unit)
    }

    fn service(&self) -> Option<&str> {
        Some(&self.unit)
    }

    async fn stop(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("stop", &self.unit, deadline).await
    }

    async fn start(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("start", &self.unit, deadline).await
    }

    async fn restart(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("restart", &self.unit, deadline).await
    }
}
