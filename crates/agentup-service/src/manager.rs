use std::path::{Path, PathBuf};

use agentup_platform::{Deadline, run_bounded};
use log::{info, warn};
use tokio::process::Command;

use crate::error::ServiceError;

/// An external service-manager binary invoked as `<program> <verb> <service>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ManagerCommand {
    pub(crate) manager: &'static str,
    pub(crate) program: PathBuf,
}

impl ManagerCommand {
    pub(crate) fn new(manager: &'static str, program: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            program: program.into(),
        }
    }

    pub(crate) fn program(&self) -> &Path {
        &self.program
    }

    pub(crate) async fn invoke(
        &self,
        verb: &'static str,
        service: &str,
        deadline: Deadline,
    ) -> Result<(), ServiceError> {
        info!(
            "{}: {} {verb} {service}",
            self.manager,
            self.program.display()
        );

        let mut cmd = Command::new(&self.program);
        cmd.args([verb, service]);

        match run_bounded(&mut cmd, deadline).await {
            Ok(_) => Ok(()),
            Err(error) => {
                warn!("{} {verb} {service} failed: {error}", self.manager);
                Err(ServiceError::command(self.manager, verb, service, error))
            }
        }
    }
}
