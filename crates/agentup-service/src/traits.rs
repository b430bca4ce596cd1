use agentup_platform::Deadline;
use async_trait::async_trait;
use log::debug;

use crate::error::ServiceError;

#[async_trait]
pub trait ServiceController: Send + Sync {
    /// Manager and service, e.g. `systemd:agent.service`.
    fn name(&self) -> String;

    /// Supervised service, for handing control to an out-of-process swap.
    fn service(&self) -> Option<&str> {
        None
    }

    /// `--nssm` value that makes `agentup-helper` pick this same manager.
    fn nssm_hint(&self) -> Option<String> {
        None
    }

    async fn stop(&self, deadline: Deadline) -> Result<(), ServiceError>;

    async fn start(&self, deadline: Deadline) -> Result<(), ServiceError>;

    async fn restart(&self, deadline: Deadline) -> Result<(), ServiceError> {
        if let Err(error) = self.stop(deadline).await {
            debug!("Ignoring stop failure during restart of {}: {error}", self.name());
        }
        self.start(deadline).await
    }
}

impl<T: ServiceController + 'static> From<T> for Box<dyn ServiceController> {
    fn from(controller: T) -> Self {
        Box::new(controller)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use agentup_platform::{CommandError, Deadline};
    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingController {
        calls: Mutex<Vec<&'static str>>,
        fail_stop: bool,
    }

    #[async_trait]
    impl ServiceController for RecordingController {
        fn name(&self) -> String {
            "recording".to_string()
        }

        async fn stop(&self, _deadline: Deadline) -> Result<(), ServiceError> {
            self.calls.lock().expect("calls lock").push("stop");
            if self.fail_stop {
                return Err(ServiceError::command(
                    "recording",
                    "stop",
                    "agent",
                    CommandError::Timeout {
                        program: "recording".to_string(),
                    },
                ));
            }
            Ok(())
        }

        async fn start(&self, _deadline: Deadline) -> Result<(), ServiceError> {
            self.calls.lock().expect("calls lock").push("start");
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_restart_is_stop_then_start() {
        let controller = RecordingController::default();

        controller
            .restart(Deadline::after(Duration::from_secs(1)))
            .await
            .expect("restart should succeed");

        assert_eq!(*controller.calls.lock().expect("calls lock"), vec!["stop", "start"]);
    }

    #[tokio::test]
    async fn default_restart_ignores_stop_failure() {
        let controller = RecordingController {
            fail_stop: true,
            ..RecordingController::default()
        };

        controller
            .restart(Deadline::after(Duration::from_secs(1)))
            .await
            .expect("a failed stop must not fail the restart");

        assert_eq!(*controller.calls.lock().expect("calls lock"), vec!["stop", "start"]);
    }

    #[tokio::test]
    async fn boxed_controller_keeps_name() {
        let boxed: Box<dyn ServiceController> = RecordingController::default().into();

        assert_eq!(boxed.name(), "recording");
        boxed
            .start(Deadline::after(Duration::from_secs(1)))
            .await
            .expect("start should succeed through the box");
    }
}
