pub mod config;
pub mod field;
pub mod layout;
pub mod reading;
pub mod render;
pub mod session;
pub mod transport;
mod utils;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info, warn};

use config::SessionConfig;
use session::{LogPresenter, SessionController, SessionState};

/// Loads configuration, streams until Ctrl-C or a terminal state, then
/// writes the configured exports.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = SessionConfig::from_env().context("failed to load configuration")?;
    info!(
        "wennerviz starting: {} readings per sweep from {}",
        config.array().total_readings(),
        config.transport.identifier()
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(stream(config))
}

async fn stream(config: SessionConfig) -> Result<()> {
    let settings = config.clone();
    let mut controller = SessionController::spawn(&config, LogPresenter::new(), move |target| {
        transport::open(target, &settings)
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("Interrupted, stopping session");
        }
        state = controller.wait_until_terminal() => {
            let state = state?;
            warn!("Session ended on its own ({state})");
        }
    }

    if let Some(dir) = &config.export_dir {
        export_all(&controller, dir).await;
    }

    let snapshot = controller.stop().await?;
    info!(
        "Session {} finished {}: {} accepted, {} rejected, {} frames skipped",
        snapshot.id, snapshot.state, snapshot.accepted, snapshot.rejected, snapshot.skipped_frames
    );

    if snapshot.state == SessionState::Failed {
        anyhow::bail!("{}", snapshot.status);
    }
    Ok(())
}

/// Best effort: a missing frame or empty history is logged, not fatal.
async fn export_all(controller: &SessionController, dir: &Path) {
    if let Err(err) = std::fs::create_dir_all(dir) {
        error!("Cannot create export directory {}: {err}", dir.display());
        return;
    }
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");

    let image_path = dir.join(format!("wenner-{stamp}.png"));
    match controller.export_image(&image_path).await {
        Ok((width, height)) => info!("Saved {width}x{height} image to {}", image_path.display()),
        Err(err) => warn!("Image export skipped: {err:#}"),
    }

    let data_path = dir.join(format!("wenner-{stamp}.txt"));
    match controller.export_data(&data_path).await {
        Ok(count) => info!("Saved {count} readings to {}", data_path.display()),
        Err(err) => warn!("Data export skipped: {err:#}"),
    }
}
