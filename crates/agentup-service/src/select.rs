use std::path::{Path, PathBuf};

use agentup_platform::{Os, Platform};
use log::{debug, warn};

use crate::launchd::LaunchdController;
use crate::noop::NoopController;
use crate::systemd::SystemdController;
use crate::traits::ServiceController;
use crate::windows::{FORCE_SC, NssmController, ScController};


/// Which service manager supervises the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceManager {
    None,
    Systemd { unit: String },
    Launchd { label: String },
    Sc { service: String },
    Nssm { service: String, program: PathBuf },
}

impl ServiceManager {
    /// Pick the manager native to `platform` for `service`.
    ///
    /// A blank service name means nothing is supervised. On Windows the NSSM
    /// binary comes from [`resolve_nssm`]; without one `sc` is used.
    #[must_use]
    pub fn for_platform(platform: &Platform, service: Option<&str>, nssm: Option<&str>) -> Self {
        let Some(service) = service.map(str::trim).filter(|s| !s.is_empty()) else {
            return ServiceManager::None;
        };
        let service = service.to_string();

        match platform.os {
            Os::Linux => ServiceManager::Systemd { unit: service },
            Os::Darwin => ServiceManager::Launchd { label: service },
            Os::Windows => match resolve_nssm(nssm) {
                Some(program) => ServiceManager::Nssm { service, program },
                None => ServiceManager::Sc { service },
            },
            Os::Other(ref os) => {
                warn!("No service manager known for {os}; {service} will not be stopped or started");
                ServiceManager::None
            }
        }
    }

    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        match self {
            ServiceManager::None => None,
            ServiceManager::Systemd { unit } => Some(unit),
            ServiceManager::Launchd { label } => Some(label),
            ServiceManager::Sc { service } | ServiceManager::Nssm { service, .. } => Some(service),
        }
    }

    #[must_use]
    pub fn into_controller(self) -> Box<dyn ServiceController> {
        match self {
            ServiceManager::None => NoopController.into(),
            ServiceManager::Systemd { unit } => SystemdController::new(unit).into(),
            ServiceManager::Launchd { label } => LaunchdController::new(label).into(),
            ServiceManager::Sc { service } => ScController::new(service).into(),
            ServiceManager::Nssm { service, program } => {
                NssmController::new(service, Some(program)).into()
            }
        }
    }
}

/// Controller for `service` under the manager native to `platform`.
#[must_use]
pub fn select_controller(
    platform: &Platform,
    service: Option<&str>,
    nssm: Option<&str>,
) -> Box<dyn ServiceController> {
    let manager = ServiceManager::for_platform(platform, service, nssm);
    debug!("Selected service manager {manager:?}");
    manager.into_controller()
}

/// Locate the NSSM binary.
///
/// An existing path wins, then `nssm` on `PATH`. `SC` (any case) disables
/// NSSM entirely.
#[must_use]
pub fn resolve_nssm(nssm: Option<&str>) -> Option<PathBuf> {
    let requested = nssm.map(str::trim).filter(|s| !s.is_empty());

    match requested {
        Some(value) if value.eq_ignore_ascii_case(FORCE_SC) => {
            debug!("NSSM disabled, using sc");
            None
        }
        Some(value) if Path::new(value).is_file() => Some(PathBuf::from(value)),
        Some(value) => {
            debug!("NSSM path {value} does not exist, searching PATH");
            which::which("nssm").ok()
        }
        None => which::which("nssm").ok(),
    }
}
