#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hermes_core::{
    AppStores, Clipboard, CoreError, CoreResult, HistoryStore, ReceiveController, Services,
    Transfer, Workflows,
};
use hermes_ipc::{
    Binary, BinaryPaths, ProcessLauncher, ReceiveOptions, TokioProcessLauncher, ZencService,
    ZendService,
};
use tempfile::TempDir;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shell scripts standing in for `zend` and `zenc`, plus a scratch home.
pub struct FakeEngines {
    bin: TempDir,
    pub scratch: TempDir,
}

impl FakeEngines {
    pub fn new() -> Self {
        Self {
            bin: TempDir::new().expect("temp bin dir"),
            scratch: TempDir::new().expect("scratch dir"),
        }
    }

    pub fn bin_dir(&self) -> &Path {
        self.bin.path()
    }

    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.scratch.path().join(name)
    }

    #[cfg(unix)]
    pub fn install(&self, binary: Binary, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = self.bin.path().join(binary.name());
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake engine");
        let mut permissions = std::fs::metadata(&path)
            .expect("fake engine metadata")
            .permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).expect("chmod fake engine");
    }

    pub fn launcher(&self) -> Arc<dyn ProcessLauncher> {
        Arc::new(TokioProcessLauncher::new(BinaryPaths::from_bin_dir(
            self.bin.path(),
        )))
    }
}

#[derive(Default)]
pub struct RecordingClipboard {
    pub writes: Mutex<Vec<String>>,
    pub fail: bool,
}

impl Clipboard for RecordingClipboard {
    fn write_text(&self, text: &str) -> CoreResult<()> {
        if self.fail {
            return Err(CoreError::Clipboard("no display".to_owned()));
        }
        self.writes
            .lock()
            .expect("clipboard lock")
            .push(text.to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    pub saved: Mutex<Vec<Transfer>>,
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn load(&self) -> CoreResult<Vec<Transfer>> {
        Ok(self.saved.lock().expect("history lock").clone())
    }

    async fn save(&self, transfers: &[Transfer]) -> CoreResult<()> {
        *self.saved.lock().expect("history lock") = transfers.to_vec();
        Ok(())
    }
}

pub struct Harness {
    pub stores: Arc<AppStores>,
    pub receive: Arc<ReceiveController>,
    pub workflows: Workflows,
    pub clipboard: Arc<RecordingClipboard>,
    pub history: Arc<MemoryHistory>,
}

impl Harness {
    pub fn new(engines: &FakeEngines) -> Self {
        Self::with_clipboard(engines, RecordingClipboard::default())
    }

    pub fn with_clipboard(engines: &FakeEngines, clipboard: RecordingClipboard) -> Self {
        let launcher = engines.launcher();
        let stores = Arc::new(AppStores::new(engines.scratch_path("downloads")));
        let zend = Arc::new(ZendService::new(Arc::clone(&launcher)));
        let zenc = Arc::new(ZencService::new(launcher));
        let receive = Arc::new(ReceiveController::new(
            Arc::clone(&stores),
            Arc::clone(&zend),
            ReceiveOptions::default(),
        ));
        let clipboard = Arc::new(clipboard);
        let history = Arc::new(MemoryHistory::default());
        let services = Services {
            zend,
            zenc,
            clipboard: Arc::clone(&clipboard) as Arc<dyn Clipboard>,
            history: Arc::clone(&history) as Arc<dyn HistoryStore>,
        };
        let workflows = Workflows::new(Arc::clone(&stores), services, Arc::clone(&receive))
            .with_config_dir(engines.scratch_path("config"))
            .with_device_key_path(engines.scratch_path("identity"));
        Self {
            stores,
            receive,
            workflows,
            clipboard,
            history,
        }
    }

    pub fn toast(&self) -> Option<String> {
        self.stores
            .toast
            .with(|toast| toast.current.as_ref().map(|toast| toast.message.clone()))
    }
}

/// Polls `condition` until it holds or the test timeout elapses.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition reached before timeout");
}
