use std::path::{Path, PathBuf};
use std::time::Duration;

use agentup_platform::{Deadline, Platform, StagingPaths};
use agentup_service::{NoopController, ServiceController};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::apply::{ApplyError, Applier, default_applier};
use crate::download::{DEFAULT_MIN_BYTES, DownloadError, download, download_client};
use crate::journal::UpdateJournal;
use crate::manifest::{Artifact, Manifest};
use crate::source::{ManifestSource, SourceError};
use crate::verify::{VerifyError, verify_sha256};
use crate::version;

/// Lifecycle of a single update run, as published on the progress channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Checking,
    NoUpdate,
    Downloading,
    Verifying,
    Applying,
    Applied,
    Failed { stage: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub current_version: String,
    pub remote_version: String,
    pub update_available: bool,
    pub artifact: Option<Artifact>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub did_update: bool,
    /// Previous binary, kept for manual rollback. `None` without an update.
    pub backup_path: Option<PathBuf>,
    pub current_path: PathBuf,
    pub remote_version: String,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("no artifact for os={os} arch={arch}")]
    NoArtifact {
        os: String,
        arch: String,
        check: Box<CheckResult>,
    },
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl UpdateError {
    /// Lifecycle stage that failed.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            UpdateError::Source(_) | UpdateError::NoArtifact { .. } => "check",
            UpdateError::Download(_) => "download",
            UpdateError::Verify(_) => "verify",
            UpdateError::Apply(_) => "apply",
        }
    }

    /// The check outcome that was available when the error occurred.
    #[must_use]
    pub fn check_result(&self) -> Option<&CheckResult> {
        match self {
            UpdateError::NoArtifact { check, .. } => Some(check),
            _ => None,
        }
    }
}

/// Everything an [`Updater`] needs to know about one installation.
pub struct UpdaterConfig {
    install_dir: PathBuf,
    exe_name: String,
    current_version: String,
    product: Option<String>,
    channel: Option<String>,
    source: Box<dyn ManifestSource>,
    controller: Box<dyn ServiceController>,
    applier: Option<Box<dyn Applier>>,
    user_agent: String,
    min_bytes: u64,
    journal: UpdateJournal,
    platform: Platform,
    progress: Option<mpsc::Sender<UpdateState>>,
}

impl UpdaterConfig {
    pub fn new(
        install_dir: impl Into<PathBuf>,
        exe_name: impl Into<String>,
        source: impl Into<Box<dyn ManifestSource>>,
    ) -> Self {
        Self {
            install_dir: install_dir.into(),
            exe_name: exe_name.into(),
            current_version: String::new(),
            product: None,
            channel: None,
            source: source.into(),
            controller: NoopController.into(),
            applier: None,
            user_agent: crate::DEFAULT_USER_AGENT.to_string(),
            min_bytes: DEFAULT_MIN_BYTES,
            journal: UpdateJournal::default(),
            platform: Platform::current(),
            progress: None,
        }
    }

    /// Installed version; blank means unknown and always updates.
    #[must_use]
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_controller(mut self, controller: impl Into<Box<dyn ServiceController>>) -> Self {
        self.controller = controller.into();
        self
    }

    #[must_use]
    pub fn with_applier(mut self, applier: impl Into<Box<dyn Applier>>) -> Self {
        self.applier = Some(applier.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    #[must_use]
    pub fn with_journal(mut self, journal: UpdateJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Platform used for artifact selection and staging names.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: mpsc::Sender<UpdateState>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.install_dir.join(&self.exe_name)
    }

    #[must_use]
    pub fn staging_paths(&self) -> StagingPaths {
        StagingPaths::for_executable(&self.current_path(), &self.platform.os)
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }
}

pub struct Updater {
    config: UpdaterConfig,
    applier: Box<dyn Applier>,
}

impl Updater {
    /// Without an explicit applier the platform default is used; on Windows
    /// it runs the helper with the configured controller's service.
    #[must_use]
    pub fn new(mut config: UpdaterConfig) -> Self {
        let applier = config.applier.take().unwrap_or_else(|| {
            let controller = config.controller.as_ref();
            default_applier(
                &config.platform,
                controller.service(),
                controller.nssm_hint().as_deref(),
            )
        });
        Self { config, applier }
    }

    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Fetch the manifest and decide whether an update applies.
    ///
    /// # Errors
    /// Returns an error when the manifest cannot be fetched or has no
    /// artifact for the configured platform; the latter carries the partial
    /// [`CheckResult`].
    pub async fn check(&self, deadline: Deadline) -> Result<CheckResult, UpdateError> {
        self.publish(UpdateState::Checking);
        let manifest = self.config.source.fetch(deadline).await?;
        self.warn_on_mismatch(&manifest);

        let platform = &self.config.platform;
        let mut result = CheckResult {
            current_version: self.config.current_version.clone(),
            remote_version: manifest.version.clone(),
            update_available: false,
            artifact: manifest.select_artifact(platform).cloned(),
            notes: manifest.notes.clone(),
        };

        if result.artifact.is_none() {
            return Err(UpdateError::NoArtifact {
                os: platform.os.to_string(),
                arch: platform.arch.to_string(),
                check: Box::new(result),
            });
        }

        result.update_available = result.current_version.trim().is_empty()
            || version::is_newer(&result.remote_version, &result.current_version);
        debug!(
            "Installed {:?}, remote {:?}, update available: {}",
            result.current_version, result.remote_version, result.update_available
        );
        Ok(result)
    }

    /// Check, and when a newer build exists download, verify and apply it.
    ///
    /// # Errors
    /// Returns the first failing stage's error. Nothing is reported as
    /// updated unless the applier succeeded.
    pub async fn update(&self, deadline: Deadline) -> Result<UpdateResult, UpdateError> {
        match self.run_update(deadline).await {
            Ok(result) => Ok(result),
            Err(error) => {
                self.config
                    .journal
                    .record(format_args!("update failed at {}: {error}", error.stage()));
                self.publish(UpdateState::Failed {
                    stage: error.stage(),
                });
                Err(error)
            }
        }
    }

    /// [`Updater::update`] bounded by a deadline `timeout` from now.
    ///
    /// # Errors
    /// See [`Updater::update`].
    pub async fn update_with_timeout(&self, timeout: Duration) -> Result<UpdateResult, UpdateError> {
        self.update(Deadline::after(timeout)).await
    }

    async fn run_update(&self, deadline: Deadline) -> Result<UpdateResult, UpdateError> {
        let journal = &self.config.journal;
        let current_path = self.config.current_path();

        let check = self.check(deadline).await?;
        let Some(artifact) = check.artifact.filter(|_| check.update_available) else {
            info!("Already up to date at {}", check.remote_version);
            self.publish(UpdateState::NoUpdate);
            return Ok(UpdateResult {
                did_update: false,
                backup_path: None,
                current_path,
                remote_version: check.remote_version,
            });
        };

        let paths = self.config.staging_paths();
        journal.record(format_args!(
            "update available: {} -> {}",
            check.current_version, check.remote_version
        ));

        self.publish(UpdateState::Downloading);
        journal.record(format_args!("downloading: {}", artifact.url));
        let client = download_client()?;
        download(
            &client,
            &artifact.url,
            &paths.new,
            &self.config.user_agent,
            self.config.min_bytes,
            deadline,
        )
        .await?;
        journal.record(format_args!("downloaded to: {}", paths.new.display()));

        self.publish(UpdateState::Verifying);
        if let Err(error) = verify_staged(&paths.new, &artifact.sha256).await {
            discard_staged(&paths.new).await;
            return Err(error.into());
        }
        journal.record("sha256 verified");

        self.publish(UpdateState::Applying);
        info!(
            "Applying {} with the {} applier",
            check.remote_version,
            self.applier.name()
        );
        let backup = self
            .applier
            .apply(self.config.controller.as_ref(), &paths, deadline)
            .await?;
        journal.record(format_args!("apply ok, old backup: {}", backup.display()));
        self.publish(UpdateState::Applied);

        Ok(UpdateResult {
            did_update: true,
            backup_path: Some(backup),
            current_path,
            remote_version: check.remote_version,
        })
    }

    fn warn_on_mismatch(&self, manifest: &Manifest) {
        let checks = [
            ("product", self.config.product.as_deref(), manifest.product.as_str()),
            ("channel", self.config.channel.as_deref(), manifest.channel.as_str()),
        ];
        for (field, expected, actual) in checks {
            if let Some(expected) = expected
                && !expected.is_empty()
                && !actual.is_empty()
                && expected != actual
            {
                warn!("Manifest {field} {actual:?} does not match configured {expected:?}");
                self.config.journal.record(format_args!(
                    "warning: manifest {field} {actual} does not match {expected}"
                ));
            }
        }
    }

    fn publish(&self, state: UpdateState) {
        if let Some(progress) = &self.config.progress
            && let Err(error) = progress.try_send(state)
        {
            debug!("Dropped progress update: {error}");
        }
    }
}

async fn verify_staged(path: &Path, expected: &str) -> Result<(), VerifyError> {
    let owned_path = path.to_path_buf();
    let expected = expected.to_string();

    tokio::task::spawn_blocking(move || verify_sha256(&owned_path, &expected))
        .await
        .map_err(|join_error| VerifyError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(join_error),
        })?
}

async fn discard_staged(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await {
        debug!("Could not remove rejected download {}: {error}", path.display());
    }
}
