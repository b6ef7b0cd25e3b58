use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::detection::DetectorStatus;

use super::simulation::{simulated_drive, SimulationPlan};
use super::sink::SensorSink;

/// Owns the synthetic sensor producer while a simulated drive runs.
pub struct SensingController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start_simulation(
        &mut self,
        sink: SensorSink,
        status_rx: watch::Receiver<DetectorStatus>,
        plan: SimulationPlan,
    ) -> Result<()> {
        if self.is_active() {
            bail!("simulation already active");
        }
        // A finished drive leaves its handle behind.
        self.handle = None;
        self.cancel_token = None;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(simulated_drive(sink, status_rx, plan, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_simulation(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("simulation task failed to join")?;
            info!("Simulation stopped");
        }
        Ok(())
    }
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}
