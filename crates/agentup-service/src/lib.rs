//! Stop/start control of the supervised agent process.
//!
//! One [`ServiceController`] implementation exists per service manager; the
//! variant is picked at runtime through [`ServiceManager`] so callers never
//! depend on compile-time platform gates.

mod error;
mod launchd;
mod manager;
mod noop;
mod select;
mod systemd;
#[cfg(all(test, unix))]
mod test_support;
mod traits;
mod windows;

pub use error::ServiceError;
pub use launchd::LaunchdController;
pub use noop::NoopController;
pub use select::{ServiceManager, resolve_nssm, select_controller};
pub use systemd::SystemdController;
pub use traits::ServiceController;
pub use windows::{NssmController, ScController};
