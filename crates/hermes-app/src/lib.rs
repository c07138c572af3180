//! Startup wiring for the `hermes` binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hermes_config::{EngineRuntimeConfig, HermesConfig, ReceiveRuntimeConfig};
use hermes_core::{
    AppStores, Clipboard, CoreError, CoreResult, JsonFileHistoryStore, ReceiveController,
    Services, TransferStatus, Workflows,
};
use hermes_ipc::{
    Binary, BinaryPaths, ProcessLauncher, ReceiveOptions, TokioProcessLauncher, ZencService,
    ZendService,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const ENV_HERMES_LOG: &str = "HERMES_LOG";

/// Peer-to-peer encrypted file sharing in the terminal.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "hermes", version)]
pub struct Cli {
    /// Config file to load (defaults to $HERMES_CONFIG or ~/.config/hermes/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the zend and zenc binaries
    #[arg(long)]
    pub bin_dir: Option<PathBuf>,

    /// Port for the receive listener
    #[arg(long)]
    pub port: Option<u16>,

    /// Start listening for incoming files once the identity is loaded
    #[arg(long)]
    pub listen: bool,
}

impl Cli {
    pub fn load_config(&self) -> Result<HermesConfig> {
        let mut config = match self.config.as_ref() {
            Some(path) => hermes_config::load_from_path(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => hermes_config::load_from_env().context("failed to load config")?,
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// Command-line flags win over the config file and the environment.
    pub fn apply_overrides(&self, config: &mut HermesConfig) {
        if let Some(bin_dir) = self.bin_dir.as_ref() {
            config.bin_dir = bin_dir.to_string_lossy().to_string();
        }
        if let Some(port) = self.port {
            config.receive.port = port;
        }
    }
}

pub fn binary_paths(engine: &EngineRuntimeConfig) -> BinaryPaths {
    let mut paths = BinaryPaths::from_bin_dir(&engine.bin_dir);
    if let Some(zend) = engine.zend_binary.as_ref() {
        paths = paths.with_override(Binary::Zend, zend.clone());
    }
    if let Some(zenc) = engine.zenc_binary.as_ref() {
        paths = paths.with_override(Binary::Zenc, zenc.clone());
    }
    paths
}

pub fn missing_binaries(paths: &BinaryPaths) -> Vec<(Binary, PathBuf)> {
    Binary::ALL
        .into_iter()
        .filter(|binary| !paths.path(*binary).exists())
        .map(|binary| (binary, paths.path(binary).to_path_buf()))
        .collect()
}

pub fn receive_options(receive: &ReceiveRuntimeConfig) -> ReceiveOptions {
    ReceiveOptions {
        port: Some(receive.port),
        output_dir: receive.output_dir.clone(),
    }
}

/// System clipboard. A fresh handle per write keeps the type `Send + Sync`.
#[derive(Debug, Default)]
pub struct ArboardClipboard;

impl Clipboard for ArboardClipboard {
    fn write_text(&self, text: &str) -> CoreResult<()> {
        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(text))
            .map_err(|error| CoreError::Clipboard(error.to_string()))
    }
}

/// Everything one running instance shares.
pub struct Runtime {
    pub stores: Arc<AppStores>,
    pub workflows: Workflows,
    pub paths: BinaryPaths,
}

pub fn build_runtime(config: &HermesConfig, clipboard: Arc<dyn Clipboard>) -> Runtime {
    let engine = config.engine_runtime();
    let receive = config.receive_runtime();
    let paths = binary_paths(&engine);

    let launcher: Arc<dyn ProcessLauncher> = Arc::new(TokioProcessLauncher::new(paths.clone()));
    let zend = Arc::new(
        ZendService::new(Arc::clone(&launcher))
            .with_send_timeout(Duration::from_secs(engine.send_timeout_secs)),
    );
    let zenc = Arc::new(ZencService::new(launcher));

    let stores = Arc::new(AppStores::new(receive.default_save_dir.clone()));
    let controller = Arc::new(ReceiveController::new(
        Arc::clone(&stores),
        Arc::clone(&zend),
        receive_options(&receive),
    ));
    let services = Services {
        zend,
        zenc,
        clipboard,
        history: Arc::new(JsonFileHistoryStore::new(config.history_path())),
    };
    let mut workflows = Workflows::new(Arc::clone(&stores), services, controller);
    if let Ok(config_dir) = hermes_config::hermes_config_dir() {
        workflows = workflows.with_config_dir(config_dir);
    }

    Runtime {
        stores,
        workflows,
        paths,
    }
}

/// Saves the transfer history whenever the set of finished transfers changes,
/// so completions reported by the receive listener are persisted too.
pub fn spawn_history_persistence(
    workflows: Workflows,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut changes = workflows.stores().transfers.subscribe();
    tokio::spawn(async move {
        let mut persisted = finished_transfers(workflows.stores());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let current = finished_transfers(workflows.stores());
            if current != persisted {
                tracing::debug!(count = current.len(), "finished transfers changed");
                workflows.persist_history().await;
                persisted = current;
            }
        }
    })
}

fn finished_transfers(stores: &AppStores) -> Vec<(String, TransferStatus)> {
    stores.transfers.with(|transfers| {
        transfers
            .history()
            .into_iter()
            .map(|transfer| (transfer.id.clone(), transfer.status))
            .collect()
    })
}

/// Appends ANSI-free logs to `log_path`; the terminal belongs to the UI.
/// `HERMES_LOG` takes precedence over `RUST_LOG`; the default level is `info`.
pub fn init_file_logging(log_path: &std::path::Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create hermes log directory '{}'", parent.display())
            })?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open hermes log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(ENV_HERMES_LOG)
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}
