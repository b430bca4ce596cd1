use std::path::PathBuf;

use agentup_platform::Deadline;
use async_trait::async_trait;

use crate::error::ServiceError;
use crate::manager::ManagerCommand;
use crate::traits::ServiceController;

const LAUNCHCTL: &str = "launchctl";

/// Controls a launchd job by label (e.g. `com.example.agent`).
///
/// `launchctl` has no restart verb, so restart falls back to stop + start.
#[derive(Debug, Clone)]
pub struct LaunchdController {
    label: String,
    command: ManagerCommand,
}

impl LaunchdController {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: ManagerCommand::new("launchd", LAUNCHCTL),
        }
    }

    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.command.program = program.into();
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[async_trait]
impl ServiceController for LaunchdController {
    fn name(&self) -> String {
        format!("launchd:{}", self.label)
    }

    fn service(&self) -> Option<&str> {
        Some(&self.label)
    }

    async fn stop(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("stop", &self.label, deadline).await
    }

    async fn start(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("start", &self.label, deadline).await
    }
}
