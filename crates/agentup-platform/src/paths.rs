use std::path::{Path, PathBuf};

use crate::platform::Os;

const HELPER_BASENAME: &str = "agentup-helper";

/// The three paths involved in swapping an installed executable.
///
/// `new` and `old` always live next to `current` so every rename stays on one
/// volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingPaths {
    pub current: PathBuf,
    pub new: PathBuf,
    pub old: PathBuf,
}

impl StagingPaths {
    #[must_use]
    pub fn new(current: PathBuf, new: PathBuf, old: PathBuf) -> Self {
        Self { current, new, old }
    }

    /// Derive the staging (`.new`) and backup (`.old`) paths for `current`.
    ///
    /// On Windows a trailing `.exe` is moved after the marker so the staged
    /// files stay executable (`agent.new.exe`); elsewhere the marker is
    /// appended (`agent.new`).
    #[must_use]
    pub fn for_executable(current: &Path, os: &Os) -> Self {
        let raw = current.as_os_str().to_string_lossy();
        let suffix = os.exe_suffix();

        let (new, old) = if suffix.is_empty() {
            (format!("{raw}.new"), format!("{raw}.old"))
        } else {
            let stem = strip_suffix_ignore_case(&raw, suffix);
            (format!("{stem}.new{suffix}"), format!("{stem}.old{suffix}"))
        };

        Self {
            current: current.to_path_buf(),
            new: PathBuf::from(new),
            old: PathBuf::from(old),
        }
    }
}

/// File name of the swap helper on `os`.
#[must_use]
pub fn helper_executable_name(os: &Os) -> String {
    format!("{HELPER_BASENAME}{}", os.exe_suffix())
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> &'a str {
    let split = value.len().saturating_sub(suffix.len());
    match (value.get(..split), value.get(split..)) {
        (Some(stem), Some(tail)) if tail.eq_ignore_ascii_case(suffix) => stem,
        _ => value,
    }
}
