use std::path::{Path, PathBuf};

use agentup_platform::Deadline;
use async_trait::async_trait;

use crate::error::ServiceError;
use crate::manager::ManagerCommand;
use crate::traits::ServiceController;

const SC: &str = "sc";
const NSSM: &str = "nssm";
/// `--nssm` value that forces `sc.exe` even when NSSM is installed.
pub(crate) const FORCE_SC: &str = "SC";

/// Windows service control manager through `sc.exe`.
#[derive(Debug, Clone)]
pub struct ScController {
    service: String,
    command: ManagerCommand,
}

impl ScController {
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            command: ManagerCommand::new("sc", SC),
        }
    }

    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.command.program = program.into();
        self
    }
}

#[async_trait]
impl ServiceController for ScController {
    fn name(&self) -> String {
        format!("sc:{}", self.service)
    }

    fn service(&self) -> Option<&str> {
        Some(&self.service)
    }

    fn nssm_hint(&self) -> Option<String> {
        Some(FORCE_SC.to_string())
    }

    async fn stop(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("stop", &self.service, deadline).await
    }

    async fn start(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("start", &self.service, deadline).await
    }
}

/// Service wrapped by the Non-Sucking Service Manager.
#[derive(Debug, Clone)]
pub struct NssmController {
    service: String,
    command: ManagerCommand,
}

impl NssmController {
    /// `nssm` is taken from `PATH` unless a binary is given.
    #[must_use]
    pub fn new(service: impl Into<String>, nssm: Option<PathBuf>) -> Self {
        Self {
            service: service.into(),
            command: ManagerCommand::new("nssm", nssm.unwrap_or_else(|| PathBuf::from(NSSM))),
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        self.command.program()
    }
}

#[async_trait]
impl ServiceController for NssmController {
    fn name(&self) -> String {
        format!("nssm:{}", self.service)
    }

    fn service(&self) -> Option<&str> {
        Some(&self.service)
    }

    fn nssm_hint(&self) -> Option<String> {
        Some(self.command.program().display().to_string())
    }

    async fn stop(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("stop", &self.service, deadline).await
    }

    async fn start(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.command.invoke("start", &self.service, deadline).await
    }
}
