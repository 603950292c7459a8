use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use porteiro_core::{NearestMatcher, SignalFile};
use porteiro_hw::Camera;
use porteiro_store::RosterStore;
use porteiro_vision::VisionPipeline;

mod config;
mod controller;
mod runner;

use config::Config;
use controller::AccessController;
use runner::Command;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        camera = %config.camera_device,
        db = %config.db_path.display(),
        channel = %config.channel_path.display(),
        tolerance = config.tolerance,
        debounce_secs = config.debounce_secs,
        "porteirod starting"
    );

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }

    // Fail fast: store, models and camera are all opened before the
    // loop starts.
    let store = RosterStore::open(&config.db_path).context("opening roster store")?;
    let matcher = NearestMatcher::new(config.tolerance, config.metric);
    let controller =
        AccessController::new(store, matcher, Duration::from_secs(config.debounce_secs))
            .context("loading roster")?;
    tracing::info!(residents = controller.roster_len(), "roster cache ready");

    let detector = VisionPipeline::load(
        &config.detect_model_path(),
        &config.encode_model_path(),
    )
    .context("loading vision models")?;

    let camera = Camera::open(&config.camera_device).context("opening camera")?;
    let channel = SignalFile::new(&config.channel_path);

    let (tx, rx) = mpsc::channel::<Command>(8);
    let engine = runner::spawn_engine(
        camera,
        detector,
        controller,
        channel,
        Duration::from_millis(config.frame_interval_ms),
        rx,
    );

    runner::print_menu();

    tokio::select! {
        _ = runner::run_console(tx.clone()) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            let _ = tx.send(Command::Quit).await;
        }
    }
    drop(tx);

    match engine.join() {
        Ok(Ok(())) => {
            tracing::info!("porteirod stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("decision loop failed"),
        Err(_) => bail!("engine thread panicked"),
    }
}
