#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hermes_ipc::{Binary, BinaryPaths, ProcessLauncher, TokioProcessLauncher};
use tempfile::TempDir;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Temporary bin directory holding shell scripts that stand in for the engines.
pub struct FakeEngines {
    dir: TempDir,
}

impl FakeEngines {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp bin dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[cfg(unix)]
    pub fn install(&self, binary: Binary, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.dir.path().join(binary.name());
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake engine");
        let mut permissions = std::fs::metadata(&path)
            .expect("fake engine metadata")
            .permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).expect("chmod fake engine");
        path
    }

    pub fn launcher(&self) -> Arc<dyn ProcessLauncher> {
        Arc::new(TokioProcessLauncher::new(BinaryPaths::from_bin_dir(
            self.dir.path(),
        )))
    }
}
