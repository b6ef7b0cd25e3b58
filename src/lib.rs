pub mod db;
pub mod detection;
pub mod permissions;
pub mod sensing;
pub mod settings;
pub mod utils;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};

use db::Database;
use detection::{DetectionConfig, DetectionController};
use permissions::StaticPermissions;
use sensing::SimulationPlan;
use settings::SettingsStore;

const DATA_DIR_ENV: &str = "MILELOG_DATA_DIR";
const SIMULATE_ENV: &str = "MILELOG_SIMULATE";
const DEFAULT_DATA_DIR: &str = "milelog-data";

/// Simulated drives started from the command line stop after this many fixes.
const SIMULATED_FIXES: usize = 60;

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("MileLog starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("milelog-runtime")
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run_detection())
}

async fn run_detection() -> Result<()> {
    let data_dir = env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let database = Database::new(data_dir.join("milelog.sqlite3"))?;
    let user_settings = settings.snapshot();

    let simulate = user_settings.debug_mode || env::var(SIMULATE_ENV).is_ok_and(|v| v == "1");
    let config = DetectionConfig::default().with_debug_mode(simulate);
    let controller = DetectionController::new(
        config,
        database.clone(),
        Arc::new(StaticPermissions::granted()),
    )?;

    info!("Trip log at {}", database.path().display());

    let mut status_rx = controller.subscribe_status();
    tokio::spawn(async move {
        let mut last = status_rx.borrow_and_update().state;
        while status_rx.changed().await.is_ok() {
            let state = status_rx.borrow_and_update().state;
            if state != last {
                info!("Detector: {}", state.label());
                last = state;
            }
        }
    });

    let mut trips = controller.subscribe_trips();
    tokio::spawn(async move {
        while let Ok(trip) = trips.recv().await {
            info!(
                "Saved trip {} ({:.2} mi, started {})",
                trip.id,
                trip.distance,
                trip.date.to_rfc3339()
            );
        }
    });

    controller.enable().await?;
    settings.set_auto_tracking_enabled(true)?;

    if simulate {
        let plan = SimulationPlan {
            max_fixes: Some(SIMULATED_FIXES),
            finish_with_stop: true,
            ..SimulationPlan::default()
        };
        controller.start_simulated_trip(plan).await?;
        info!("Simulated drive running; press Ctrl-C to stop early");

        let mut status_rx = controller.subscribe_status();
        // Wait for tracking to start and then finish.
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = async {
                let _ = status_rx.wait_for(|s| s.state == detection::DetectionState::Tracking).await;
                let _ = status_rx.wait_for(|s| s.state == detection::DetectionState::Idle).await;
            } => {}
        }
    } else {
        info!("Waiting for sensor input; press Ctrl-C to exit");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    }

    if let Err(err) = controller.shutdown().await {
        warn!("Detector shutdown reported: {err}");
    }

    let rate = user_settings.effective_mileage_rate();
    let summary = database.mileage_summary(rate).await?;
    info!(
        "{:.1} business mi, {:.1} personal mi, {:.1} unclassified mi; ${:.2} deductible at ${rate:.2}/mi",
        summary.business_miles, summary.personal_miles, summary.unclassified_miles, summary.deduction
    );
    Ok(())
}
