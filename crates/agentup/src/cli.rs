use std::path::PathBuf;

use agentup_core::{
    Applier, FileManifestSource, HelperApplier, HttpManifestSource, ManifestSource, UpdateJournal,
    UpdaterConfig, default_applier,
};
use agentup_platform::Platform;
use agentup_service::ServiceManager;
use clap::Parser;

const DEFAULT_EXE_STEM: &str = "agent";
const JOURNAL_FILE_NAME: &str = "agentup.log";

#[derive(Debug, Parser)]
#[command(
    name = "agentup",
    version,
    about = "Check for and install updates of a supervised agent binary"
)]
pub struct Cli {
    /// Manifest URL (`http://`, `https://`) or local file.
    #[arg(long)]
    pub manifest: String,

    /// Install directory holding the agent executable.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Executable name; defaults to `agent` with the platform suffix.
    #[arg(long)]
    pub exe: Option<String>,

    /// Installed version. Omit to always install the manifest's build.
    #[arg(long)]
    pub current: Option<String>,

    /// Expected manifest product; a mismatch is only reported.
    #[arg(long)]
    pub product: Option<String>,

    /// Expected manifest channel; a mismatch is only reported.
    #[arg(long)]
    pub channel: Option<String>,

    /// Update journal; defaults to `<dir>/agentup.log`.
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Service supervising the agent, managed by the platform's native manager.
    #[arg(long)]
    pub service: Option<String>,

    /// NSSM binary on Windows, or `SC` to force `sc.exe`.
    #[arg(long)]
    pub nssm: Option<String>,

    /// Manage the agent through this systemd unit.
    #[arg(long, conflicts_with_all = ["launchd", "service"])]
    pub systemd: Option<String>,

    /// Manage the agent through this launchd label.
    #[arg(long, conflicts_with = "service")]
    pub launchd: Option<String>,

    /// Swap through this helper binary instead of in-process.
    #[arg(long)]
    pub helper: Option<PathBuf>,

    /// Overall deadline in seconds.
    #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Report whether an update is available without installing it.
    #[arg(long)]
    pub check: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn exe_name(&self, platform: &Platform) -> String {
        self.exe
            .clone()
            .unwrap_or_else(|| format!("{DEFAULT_EXE_STEM}{}", platform.exe_suffix()))
    }

    pub fn journal_path(&self) -> PathBuf {
        self.log
            .clone()
            .unwrap_or_else(|| self.dir.join(JOURNAL_FILE_NAME))
    }

    pub fn manifest_source(&self) -> Box<dyn ManifestSource> {
        let lowered = self.manifest.trim().to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            HttpManifestSource::new(self.manifest.trim()).into()
        } else {
            FileManifestSource::new(&self.manifest).into()
        }
    }

    /// Explicit `--systemd`/`--launchd` win over the platform default.
    pub fn service_manager(&self, platform: &Platform) -> ServiceManager {
        if let Some(unit) = non_blank(self.systemd.as_deref()) {
            return ServiceManager::Systemd {
                unit: unit.to_string(),
            };
        }
        if let Some(label) = non_blank(self.launchd.as_deref()) {
            return ServiceManager::Launchd {
                label: label.to_string(),
            };
        }
        ServiceManager::for_platform(platform, self.service.as_deref(), self.nssm.as_deref())
    }

    fn applier(&self, platform: &Platform, manager: &ServiceManager) -> Box<dyn Applier> {
        let Some(helper) = &self.helper else {
            return default_applier(platform, manager.service_name(), self.nssm.as_deref());
        };

        let mut applier = HelperApplier::new()
            .with_platform(platform)
            .with_helper_path(helper);
        if let Some(service) = manager.service_name() {
            applier = applier.with_service(service);
        }
        if let Some(nssm) = &self.nssm {
            applier = applier.with_nssm(nssm.clone());
        }
        applier.into()
    }

    pub fn updater_config(&self, platform: Platform) -> UpdaterConfig {
        let manager = self.service_manager(&platform);
        let applier = self.applier(&platform, &manager);

        let mut config = UpdaterConfig::new(
            &self.dir,
            self.exe_name(&platform),
            self.manifest_source(),
        )
        .with_current_version(self.current.clone().unwrap_or_default())
        .with_journal(UpdateJournal::new().with_file(self.journal_path()))
        .with_controller(manager.into_controller())
        .with_applier(applier)
        .with_platform(platform);

        if let Some(product) = &self.product {
            config = config.with_product(product.clone());
        }
        if let Some(channel) = &self.channel {
            config = config.with_channel(channel.clone());
        }
        config
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
