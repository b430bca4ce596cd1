use agentup_platform::CommandError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{manager} {verb} {service} failed: {source}")]
    Command {
        manager: &'static str,
        verb: &'static str,
        service: String,
        #[source]
        source: CommandError,
    },
}

impl ServiceError {
    pub fn command(
        manager: &'static str,
        verb: &'static str,
        service: impl Into<String>,
        source: CommandError,
    ) -> Self {
        Self::Command {
            manager,
            verb,
            service: service.into(),
            source,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ServiceError::Command {
                source: CommandError::Timeout { .. },
                ..
            }
        )
    }
}
