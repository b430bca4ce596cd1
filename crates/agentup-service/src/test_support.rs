use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tempfile::TempDir;

/// A stand-in service-manager binary that records its arguments.
pub(crate) struct FakeManager {
    dir: TempDir,
}

impl FakeManager {
    pub(crate) fn new(exit_code: i32) -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let log = dir.path().join("calls.log");
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\nexit {exit_code}\n",
            log.display()
        );
        let program = dir.path().join("manager");
        std::fs::write(&program, script).expect("fake manager should be written");
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))
            .expect("fake manager should be executable");
        Self { dir }
    }

    pub(crate) fn program(&self) -> PathBuf {
        self.dir.path().join("manager")
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
