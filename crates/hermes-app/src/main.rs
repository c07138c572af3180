use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use hermes_app::{
    build_runtime, init_file_logging, missing_binaries, spawn_history_persistence,
    ArboardClipboard, Cli,
};
use hermes_ui::{App, Ui, WorkflowRunner};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_file_logging(&config.log_path())?;
    tracing::info!(
        bin_dir = %config.bin_dir,
        port = config.receive.port,
        history = %config.history_path,
        "hermes starting"
    );

    let runtime = build_runtime(&config, Arc::new(ArboardClipboard));
    let missing = missing_binaries(&runtime.paths);
    for (binary, path) in &missing {
        tracing::error!(binary = %binary, path = %path.display(), "engine binary not found");
    }

    let workflows = runtime.workflows.clone();
    workflows.load_history().await;
    workflows.load_identity().await;
    if cli.listen && runtime.stores.has_identity() {
        workflows.start_listening().await;
    }
    if !missing.is_empty() {
        let listed = missing
            .iter()
            .map(|(binary, path)| format!("{binary} not found at {}", path.display()))
            .collect::<Vec<_>>()
            .join("\n");
        runtime.stores.show_error_modal(listed);
    }

    let shutdown = CancellationToken::new();
    let persistence = spawn_history_persistence(workflows.clone(), shutdown.clone());
    let runner: Arc<dyn WorkflowRunner> = Arc::new(workflows.clone());
    let mut app = App::new(Arc::clone(&runtime.stores), runner)?;

    let ui_result = match Ui::init() {
        Ok(mut ui) => ui.run(&mut app),
        Err(error) => Err(error),
    };

    shutdown.cancel();
    if let Err(error) = persistence.await {
        tracing::warn!(error = %error, "history persistence task failed");
    }
    workflows.stop_listening().await;
    tracing::info!("hermes stopped");

    ui_result?;
    Ok(())
}
