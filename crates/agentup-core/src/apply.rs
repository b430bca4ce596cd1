use std::path::{Path, PathBuf};
use std::time::Duration;

use agentup_platform::{
    CommandError, Deadline, FsError, Os, Platform, StagingPaths, helper_executable_name,
    run_bounded,
};
use agentup_service::{ServiceController, ServiceError};
use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::process::Command;

use crate::swap::{SwapError, SwapPolicy, swap_binaries};

/// Exit code of `agentup-helper` when a rename failed and was rolled back.
pub const HELPER_EXIT_SWAP: u8 = 2;
/// Exit code of `agentup-helper` when the service failed to start and the
/// previous binary was restored.
pub const HELPER_EXIT_START: u8 = 3;

const HELPER_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("swap failed and was rolled back: {0}")]
    Swap(#[source] FsError),
    #[error("service start failed and the previous binary was restored: {0}")]
    Start(#[source] ServiceError),
    #[error("update helper not found: {}", .path.display())]
    HelperNotFound { path: PathBuf },
    #[error("failed to launch update helper {}: {source}", .path.display())]
    HelperSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("update helper could not swap binaries and rolled back{}", detail(.stderr.as_str()))]
    HelperSwap { stderr: String },
    #[error("update helper restored the previous binary after a failed start{}", detail(.stderr.as_str()))]
    HelperStart { stderr: String },
    #[error("update helper failed with exit code {}{}", exit_code_text(.code.as_ref()), detail(.stderr.as_str()))]
    HelperExit { code: Option<i32>, stderr: String },
    #[error("update helper did not finish before the deadline")]
    HelperTimeout,
}

impl From<SwapError> for ApplyError {
    fn from(error: SwapError) -> Self {
        match error {
            SwapError::Swap(source) => ApplyError::Swap(source),
            SwapError::Start(source) => ApplyError::Start(source),
        }
    }
}

fn exit_code_text(code: Option<&i32>) -> String {
    code.map_or_else(|| "none".to_string(), ToString::to_string)
}

fn detail(stderr: &str) -> String {
    let line = stderr.lines().rev().find(|line| !line.trim().is_empty());
    line.map(|line| format!(": {}", line.trim())).unwrap_or_default()
}

/// Installs a staged binary over the current one.
#[async_trait]
pub trait Applier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the path of the backup of the previous binary.
    async fn apply(
        &self,
        controller: &dyn ServiceController,
        paths: &StagingPaths,
        deadline: Deadline,
    ) -> Result<PathBuf, ApplyError>;
}

impl<T: Applier + 'static> From<T> for Box<dyn Applier> {
    fn from(applier: T) -> Self {
        Box::new(applier)
    }
}

/// Swaps in-process. Works wherever a running executable can be renamed.
#[derive(Debug, Clone, Default)]
pub struct DirectSwapApplier {
    policy: SwapPolicy,
}

impl DirectSwapApplier {
    #[must_use]
    pub fn new(policy: SwapPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Applier for DirectSwapApplier {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn apply(
        &self,
        controller: &dyn ServiceController,
        paths: &StagingPaths,
        deadline: Deadline,
    ) -> Result<PathBuf, ApplyError> {
        Ok(swap_binaries(controller, paths, &self.policy, deadline).await?)
    }
}

/// Hands the swap to `agentup-helper` so the updater's own process never
/// holds the executable being replaced.
///
/// The helper stops and starts the service itself, so the controller passed
/// to [`Applier::apply`] is not used.
#[derive(Debug, Clone)]
pub struct HelperApplier {
    helper_path: Option<PathBuf>,
    service: Option<String>,
    nssm: Option<String>,
    os: Os,
    settle: Duration,
}

impl Default for HelperApplier {
    fn default() -> Self {
        Self {
            helper_path: None,
            service: None,
            nssm: None,
            os: Os::current(),
            settle: HELPER_SETTLE,
        }
    }
}

impl HelperApplier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_helper_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.helper_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn with_nssm(mut self, nssm: impl Into<String>) -> Self {
        self.nssm = Some(nssm.into());
        self
    }

    /// Platform whose executable naming the default helper path follows.
    #[must_use]
    pub fn with_platform(mut self, platform: &Platform) -> Self {
        self.os = platform.os.clone();
        self
    }

    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// The configured helper, or `agentup-helper[.exe]` next to `current`.
    #[must_use]
    pub fn helper_for(&self, current: &Path) -> PathBuf {
        self.helper_path.clone().unwrap_or_else(|| {
            current
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(helper_executable_name(&self.os))
        })
    }

    fn command(&self, helper: &Path, paths: &StagingPaths) -> Command {
        let mut command = Command::new(helper);
        command
            .arg("--current")
            .arg(&paths.current)
            .arg("--new")
            .arg(&paths.new)
            .arg("--old")
            .arg(&paths.old);
        if let Some(service) = self.service.as_deref().filter(|s| !s.trim().is_empty()) {
            command.arg("--service").arg(service);
        }
        if let Some(nssm) = self.nssm.as_deref().filter(|s| !s.trim().is_empty()) {
            command.arg("--nssm").arg(nssm);
        }
        command
    }
}

#[async_trait]
impl Applier for HelperApplier {
    fn name(&self) -> &'static str {
        "helper"
    }

    async fn apply(
        &self,
        controller: &dyn ServiceController,
        paths: &StagingPaths,
        deadline: Deadline,
    ) -> Result<PathBuf, ApplyError> {
        let helper = self.helper_for(&paths.current);
        if !tokio::fs::try_exists(&helper).await.unwrap_or(false) {
            return Err(ApplyError::HelperNotFound { path: helper });
        }

        debug!(
            "Delegating swap to {} (in-process controller {} unused)",
            helper.display(),
            controller.name()
        );
        info!("Running update helper {}", helper.display());

        match run_bounded(&mut self.command(&helper, paths), deadline).await {
            Ok(_) => Ok(paths.old.clone()),
            Err(error) => {
                warn!("Update helper failed: {error}");
                tokio::time::sleep(self.settle).await;
                Err(helper_error(helper, error))
            }
        }
    }
}

fn helper_error(path: PathBuf, error: CommandError) -> ApplyError {
    match error {
        CommandError::Spawn { source, .. } => ApplyError::HelperSpawn { path, source },
        CommandError::Timeout { .. } => ApplyError::HelperTimeout,
        CommandError::Exit { code, stderr, .. } => match code {
            Some(code) if code == i32::from(HELPER_EXIT_SWAP) => ApplyError::HelperSwap { stderr },
            Some(code) if code == i32::from(HELPER_EXIT_START) => {
                ApplyError::HelperStart { stderr }
            }
            _ => ApplyError::HelperExit { code, stderr },
        },
    }
}

/// Applier suited to `platform`: Windows cannot replace a running executable
/// from inside the process tree that may hold it, so it delegates to the
/// helper.
#[must_use]
pub fn default_applier(
    platform: &Platform,
    service: Option<&str>,
    nssm: Option<&str>,
) -> Box<dyn Applier> {
    if platform.is_windows() {
        let mut applier = HelperApplier::new().with_platform(platform);
        if let Some(service) = service {
            applier = applier.with_service(service);
        }
        if let Some(nssm) = nssm {
            applier = applier.with_nssm(nssm);
        }
        applier.into()
    } else {
        DirectSwapApplier::default().into()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use agentup_platform::{Arch, Deadline, Os, Platform, StagingPaths};
    use agentup_service::NoopController;

    use super::{ApplyError, Applier, DirectSwapApplier, HelperApplier, default_applier};
    use crate::swap::SwapPolicy;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    #[test]
    fn default_applier_depends_on_platform() {
        let windows = Platform::new(Os::Windows, Arch::Amd64);
        let linux = Platform::new(Os::Linux, Arch::Arm64);

        assert_eq!(default_applier(&windows, Some("Agent"), None).name(), "helper");
        assert_eq!(default_applier(&linux, None, None).name(), "direct");
    }

    #[test]
    fn helper_defaults_to_install_dir() {
        let helper = HelperApplier::new().helper_for(Path::new("/opt/agent/agent"));
        assert_eq!(helper.parent(), Some(Path::new("/opt/agent")));
        assert!(
            helper
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("agentup-helper"))
        );
    }

    #[test]
    fn helper_name_follows_configured_platform() {
        let windows = Platform::new(Os::Windows, Arch::Amd64);

        let helper = HelperApplier::new()
            .with_platform(&windows)
            .helper_for(Path::new("/opt/agent/agent.exe"));

        assert_eq!(helper, Path::new("/opt/agent/agentup-helper.exe"));
    }

    #[test]
    fn helper_error_text_uses_last_stderr_line() {
        let error = ApplyError::HelperStart {
            stderr: "stopping\nstart failed: exit 1\n".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "update helper restored the previous binary after a failed start: start failed: exit 1"
        );
    }

    #[tokio::test]
    async fn missing_helper_fails_without_touching_files() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let paths = StagingPaths::for_executable(&temp.path().join("agent"), &Os::current());
        std::fs::write(&paths.current, b"v1").expect("current should be written");
        std::fs::write(&paths.new, b"v2").expect("new should be written");

        let error = HelperApplier::new()
            .apply(&NoopController, &paths, deadline())
            .await
            .expect_err("missing helper should fail");

        assert!(matches!(error, ApplyError::HelperNotFound { .. }));
        assert_eq!(std::fs::read(&paths.current).expect("current"), b"v1");
        assert_eq!(std::fs::read(&paths.new).expect("new"), b"v2");
    }

    #[tokio::test]
    async fn direct_applier_swaps_in_process() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let paths = StagingPaths::for_executable(&temp.path().join("agent"), &Os::Linux);
        std::fs::write(&paths.current, b"v1").expect("current should be written");
        std::fs::write(&paths.new, b"v2").expect("new should be written");
        let policy = SwapPolicy::default()
            .with_stop_settle(Duration::ZERO)
            .with_delay(Duration::from_millis(1));

        let backup = DirectSwapApplier::new(policy)
            .apply(&NoopController, &paths, deadline())
            .await
            .expect("direct swap should succeed");

        assert_eq!(backup, paths.old);
        assert_eq!(std::fs::read(&paths.current).expect("current"), b"v2");
    }

    #[cfg(unix)]
    mod unix {
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};
        use std::time::Duration;

        use agentup_platform::{Os, StagingPaths};
        use agentup_service::NoopController;

        use super::deadline;
        use crate::apply::{ApplyError, Applier, HelperApplier};

        fn fake_helper(dir: &Path, exit_code: i32) -> PathBuf {
            let path = dir.join("agentup-helper");
            let script = format!(
                "#!/bin/sh\necho \"$@\" > '{}'\necho 'helper says no' >&2\nexit {exit_code}\n",
                dir.join("helper-args").display()
            );
            std::fs::write(&path, script).expect("fake helper should be written");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("fake helper should be executable");
            path
        }

        fn paths(dir: &Path) -> StagingPaths {
            StagingPaths::for_executable(&dir.join("agent"), &Os::Linux)
        }

        #[tokio::test]
        async fn helper_receives_paths_and_service() {
            let temp = tempfile::tempdir().expect("tempdir should be created");
            fake_helper(temp.path(), 0);
            let paths = paths(temp.path());

            let backup = HelperApplier::new()
                .with_service("agent.service")
                .apply(&NoopController, &paths, deadline())
                .await
                .expect("helper should succeed");

            assert_eq!(backup, paths.old);
            let args = std::fs::read_to_string(temp.path().join("helper-args"))
                .expect("helper args should be recorded");
            assert_eq!(
                args.trim(),
                format!(
                    "--current {} --new {} --old {} --service agent.service",
                    paths.current.display(),
                    paths.new.display(),
                    paths.old.display()
                )
            );
        }

        #[tokio::test]
        async fn helper_start_failure_maps_to_distinct_error() {
            let temp = tempfile::tempdir().expect("tempdir should be created");
            let helper = fake_helper(temp.path(), 3);

            let error = HelperApplier::new()
                .with_helper_path(helper)
                .with_settle(Duration::ZERO)
                .apply(&NoopController, &paths(temp.path()), deadline())
                .await
                .expect_err("exit 3 should fail");

            assert!(matches!(error, ApplyError::HelperStart { ref stderr } if stderr == "helper says no"));
        }

        #[tokio::test]
        async fn helper_swap_failure_and_other_codes() {
            let temp = tempfile::tempdir().expect("tempdir should be created");
            let swap_dir = temp.path().join("swap");
            let other_dir = temp.path().join("other");
            std::fs::create_dir_all(&swap_dir).expect("dir should be created");
            std::fs::create_dir_all(&other_dir).expect("dir should be created");
            fake_helper(&swap_dir, 2);
            fake_helper(&other_dir, 7);
            let applier = HelperApplier::new().with_settle(Duration::ZERO);

            let swap = applier
                .apply(&NoopController, &paths(&swap_dir), deadline())
                .await
                .expect_err("exit 2 should fail");
            let other = applier
                .apply(&NoopController, &paths(&other_dir), deadline())
                .await
                .expect_err("exit 7 should fail");

            assert!(matches!(swap, ApplyError::HelperSwap { .. }));
            assert!(matches!(other, ApplyError::HelperExit { code: Some(7), .. }));
        }
    }
}
