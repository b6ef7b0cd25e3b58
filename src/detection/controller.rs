use std::{
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use tokio::{
    runtime::Handle,
    sync::{broadcast, oneshot, watch, Mutex as AsyncMutex},
    time::{self, Duration, Instant, MissedTickBehavior},
};

use crate::db::models::Trip;
use crate::permissions::{PermissionProvider, PermissionStatus, PlatformAvailability};
use crate::sensing::{SensingController, SensorSink, SimulationPlan};

use super::{
    config::DetectionConfig,
    detector::TripDetector,
    error::DetectorError,
    state::DetectorStatus,
    store::TripStore,
    types::{LocationFix, MotionSample},
};

const TRIP_EVENTS_CAPACITY: usize = 16;

/// tokio intervals reject a zero period.
const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

type FinalizeReply = oneshot::Sender<Result<Option<Trip>, DetectorError>>;

/// Everything the detector worker consumes, in one queue.
pub(crate) enum Command {
    Motion(MotionSample),
    Locations(Vec<LocationFix>),
    LocationError(String),
    Authorization(PermissionStatus),
    DebounceTick { generation: u64 },
    Enable {
        availability: PlatformAvailability,
        reply: oneshot::Sender<Result<(), DetectorError>>,
    },
    Disable { reply: FinalizeReply },
    SetDebugMode {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    InjectDistance {
        miles: f64,
        reply: oneshot::Sender<bool>,
    },
    ForceFinish { reply: FinalizeReply },
    Shutdown { reply: Option<FinalizeReply> },
}

struct ControllerInner {
    sender: mpsc::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            // Already gone when shutdown() ran first.
            let _ = self.sender.send(Command::Shutdown { reply: None });
            if let Err(join_err) = handle.join() {
                error!("Failed to join detector thread: {join_err:?}");
            }
        }
    }
}

/// Async front of the trip detector.
///
/// A dedicated thread owns the [`TripDetector`] and processes commands one at a time,
/// so sensor callbacks, debounce ticks and user commands never interleave inside a
/// transition. Cloning the controller shares the same detector.
#[derive(Clone)]
pub struct DetectionController {
    inner: Arc<ControllerInner>,
    status_rx: watch::Receiver<DetectorStatus>,
    trips_tx: broadcast::Sender<Trip>,
    permissions: Arc<dyn PermissionProvider>,
    sensing: Arc<AsyncMutex<SensingController>>,
}

impl DetectionController {
    /// Starts the detector worker. Must be called from within a tokio runtime, which
    /// also hosts the debounce ticker.
    pub fn new<S>(
        config: DetectionConfig,
        store: S,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Result<Self>
    where
        S: TripStore + 'static,
    {
        let runtime = Handle::try_current()
            .context("detection controller needs a running tokio runtime")?;

        let detector = TripDetector::new(config, store);
        let (command_tx, command_rx) = mpsc::channel::<Command>();
        let (status_tx, status_rx) = watch::channel(detector.status());
        let (trips_tx, _) = broadcast::channel(TRIP_EVENTS_CAPACITY);

        let worker = DetectorWorker {
            detector,
            runtime,
            commands: command_tx.clone(),
            ticker: None,
            status_tx,
            trips_tx: trips_tx.clone(),
        };

        let handle = thread::Builder::new()
            .name("milelog-detector".into())
            .spawn(move || worker.run(command_rx))
            .context("failed to spawn detector worker thread")?;

        Ok(Self {
            inner: Arc::new(ControllerInner {
                sender: command_tx,
                worker: Mutex::new(Some(handle)),
            }),
            status_rx,
            trips_tx,
            permissions,
            sensing: Arc::new(AsyncMutex::new(SensingController::new())),
        })
    }

    /// Handle for host sensor callbacks.
    pub fn sink(&self) -> SensorSink {
        SensorSink::new(self.inner.sender.clone())
    }

    pub fn status(&self) -> DetectorStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<DetectorStatus> {
        self.status_rx.clone()
    }

    /// Trips saved from now on.
    pub fn subscribe_trips(&self) -> broadcast::Receiver<Trip> {
        self.trips_tx.subscribe()
    }

    pub fn request_permissions(&self) {
        self.permissions.request_permissions();
    }

    pub async fn enable(&self) -> Result<(), DetectorError> {
        let availability = self.permissions.availability();
        self.request(|reply| Command::Enable {
            availability,
            reply,
        })
        .await?
    }

    /// Detaches the simulated sensors, stops the debounce timer and finalizes any trip
    /// in progress. Returns once the store hand-off finished.
    pub async fn disable(&self) -> Result<Option<Trip>, DetectorError> {
        self.stop_simulation().await;
        self.request(|reply| Command::Disable { reply }).await?
    }

    pub async fn set_debug_mode(&self, enabled: bool) -> Result<(), DetectorError> {
        self.request(|reply| Command::SetDebugMode { enabled, reply })
            .await
    }

    pub async fn inject_distance(&self, miles: f64) -> Result<bool, DetectorError> {
        self.request(|reply| Command::InjectDistance { miles, reply })
            .await
    }

    pub async fn force_finish(&self) -> Result<Option<Trip>, DetectorError> {
        self.request(|reply| Command::ForceFinish { reply }).await?
    }

    /// Debug only: drives a synthetic trip through the detector.
    pub async fn start_simulated_trip(&self, plan: SimulationPlan) -> Result<()> {
        let status = self.status();
        if !status.debug_mode {
            bail!("simulated trips need debug mode");
        }
        if !status.enabled {
            bail!("trip detection is not enabled");
        }

        self.sensing
            .lock()
            .await
            .start_simulation(self.sink(), self.subscribe_status(), plan)
    }

    /// Ends the synthetic drive and finishes the trip it produced, if any.
    pub async fn stop_simulated_trip(&self) -> Result<Option<Trip>, DetectorError> {
        self.stop_simulation().await;
        self.force_finish().await
    }

    /// Finalizes any trip in progress and stops the worker thread.
    pub async fn shutdown(&self) -> Result<Option<Trip>, DetectorError> {
        self.stop_simulation().await;
        let result = self
            .request(|reply| Command::Shutdown { reply: Some(reply) })
            .await?;

        let handle = {
            let mut guard = match self.inner.worker.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        if let Some(handle) = handle {
            tokio::task::spawn_blocking(move || handle.join())
                .await
                .map_err(|_| DetectorError::RuntimeUnavailable)?
                .map_err(|_| DetectorError::RuntimeUnavailable)?;
        }
        result
    }

    async fn stop_simulation(&self) {
        if let Err(err) = self.sensing.lock().await.stop_simulation().await {
            warn!("Failed to stop simulated sensors: {err:#}");
        }
    }

    fn send(&self, command: Command) -> Result<(), DetectorError> {
        self.inner
            .sender
            .send(command)
            .map_err(|_| DetectorError::RuntimeUnavailable)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, DetectorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(build(reply_tx))?;
        reply_rx.await.map_err(|_| DetectorError::RuntimeUnavailable)
    }
}

struct DetectorWorker<S: TripStore> {
    detector: TripDetector<S>,
    runtime: Handle,
    commands: mpsc::Sender<Command>,
    ticker: Option<(u64, tokio::task::JoinHandle<()>)>,
    status_tx: watch::Sender<DetectorStatus>,
    trips_tx: broadcast::Sender<Trip>,
}

impl<S: TripStore> DetectorWorker<S> {
    fn run(mut self, commands: mpsc::Receiver<Command>) {
        info!("Detector worker started");

        while let Ok(command) = commands.recv() {
            if !self.handle(command) {
                break;
            }
        }

        self.cancel_ticker();
        info!("Detector worker shutting down");
    }

    /// Returns false when the worker should exit.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Motion(sample) => {
                let result = self.detector.on_motion_sample(sample);
                let _ = self.finish(result);
                self.settle();
            }
            Command::Locations(fixes) => {
                for fix in fixes {
                    self.detector.on_location_fix(fix);
                }
                self.settle();
            }
            Command::LocationError(message) => {
                self.detector.on_location_error(&message);
                self.settle();
            }
            Command::Authorization(status) => {
                self.detector.on_authorization_changed(status);
                self.settle();
            }
            Command::DebounceTick { generation } => {
                if generation == self.detector.debounce().generation() {
                    self.detector.on_debounce_tick();
                    self.settle();
                }
            }
            Command::Enable {
                availability,
                reply,
            } => {
                let result = self.detector.enable(availability);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Disable { reply } => {
                self.cancel_ticker();
                let result = self.detector.disable();
                let result = self.finish(result);
                self.settle();
                let _ = reply.send(result);
            }
            Command::SetDebugMode { enabled, reply } => {
                self.detector.set_debug_mode(enabled);
                self.settle();
                let _ = reply.send(());
            }
            Command::InjectDistance { miles, reply } => {
                let injected = self.detector.inject_distance(miles);
                self.settle();
                let _ = reply.send(injected);
            }
            Command::ForceFinish { reply } => {
                let result = self.detector.force_finish();
                let result = self.finish(result);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => {
                self.cancel_ticker();
                let result = self.detector.disable();
                let result = self.finish(result);
                self.settle();
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
                return false;
            }
        }
        true
    }

    /// Announces a saved trip and passes the result through.
    fn finish(
        &self,
        result: Result<Option<Trip>, DetectorError>,
    ) -> Result<Option<Trip>, DetectorError> {
        match &result {
            Ok(Some(trip)) => {
                // No subscribers is fine.
                let _ = self.trips_tx.send(trip.clone());
            }
            Ok(None) => {}
            Err(err) => warn!("Trip finalize reported: {err}"),
        }
        result
    }

    /// Brings the debounce ticker in line with the detector and publishes status.
    fn settle(&mut self) {
        let debounce = self.detector.debounce();
        if self.detector.is_enabled() && debounce.is_armed() {
            let generation = debounce.generation();
            if self.ticker.as_ref().map(|(current, _)| *current) != Some(generation) {
                self.cancel_ticker();
                self.spawn_ticker(generation);
            }
        } else {
            self.cancel_ticker();
        }

        self.status_tx.send_replace(self.detector.status());
    }

    fn spawn_ticker(&mut self, generation: u64) {
        let commands = self.commands.clone();
        let period = self
            .detector
            .config()
            .debounce_interval
            .max(MIN_TICK_PERIOD);

        let handle = self.runtime.spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if commands.send(Command::DebounceTick { generation }).is_err() {
                    break;
                }
            }
        });

        self.ticker = Some((generation, handle));
    }

    fn cancel_ticker(&mut self) {
        if let Some((_, handle)) = self.ticker.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::state::{DetectionState, LocationUpdates};
    use crate::detection::store::MemoryTripStore;
    use crate::detection::types::Confidence;
    use crate::permissions::{LocationAuthorization, StaticPermissions};

    const WAIT: Duration = Duration::from_secs(5);

    /// Latitude degrees spanning one statute mile.
    const MILE_IN_LAT_DEGREES: f64 = 1609.34 / (6_371_000.0 * std::f64::consts::PI / 180.0);

    fn controller(debug_mode: bool) -> (DetectionController, MemoryTripStore) {
        let store = MemoryTripStore::new();
        let config = DetectionConfig {
            debounce_interval: Duration::from_millis(20),
            ..DetectionConfig::default()
        }
        .with_debug_mode(debug_mode);
        let controller = DetectionController::new(
            config,
            store.clone(),
            Arc::new(StaticPermissions::granted()),
        )
        .expect("controller");
        (controller, store)
    }

    async fn wait_for_state(controller: &DetectionController, state: DetectionState) {
        let mut status_rx = controller.subscribe_status();
        time::timeout(WAIT, status_rx.wait_for(|status| status.state == state))
            .await
            .expect("timed out waiting for state")
            .expect("status channel closed");
    }

    async fn start_tracking(controller: &DetectionController) {
        let sink = controller.sink();
        for _ in 0..3 {
            assert!(sink.post_motion(MotionSample::driving(Confidence::High)));
        }
        wait_for_state(controller, DetectionState::Tracking).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sensor_drive_saves_one_mile_trip() {
        let (controller, store) = controller(false);
        let mut trips = controller.subscribe_trips();
        controller.enable().await.expect("enable");

        start_tracking(&controller).await;
        let sink = controller.sink();
        sink.post_locations(vec![
            LocationFix::new(37.0, -122.0, 5.0),
            LocationFix::new(37.0 + MILE_IN_LAT_DEGREES, -122.0, 5.0),
        ]);
        sink.post_motion(MotionSample::stopped(Confidence::High));

        let trip = time::timeout(WAIT, trips.recv())
            .await
            .expect("timed out waiting for trip")
            .expect("trip channel closed");
        assert!((trip.distance - 1.0).abs() < 0.01, "distance {}", trip.distance);
        assert!(trip.is_auto_detected);
        assert_eq!(store.trips().len(), 1);

        let status = controller.status();
        assert_eq!(status.state, DetectionState::Idle);
        assert_eq!(status.confirmations, 0);
        assert!(status.enabled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn enable_without_location_access_is_denied() {
        let permissions = Arc::new(StaticPermissions::granted());
        let mut status = PermissionStatus::granted();
        status.location = LocationAuthorization::WhenInUse;
        permissions.set_status(status);

        let controller = DetectionController::new(
            DetectionConfig::default(),
            MemoryTripStore::new(),
            permissions,
        )
        .expect("controller");

        let err = controller.enable().await.expect_err("denied");
        assert!(matches!(err, DetectorError::PermissionDenied(_)));
        let status = controller.status();
        assert!(!status.enabled);
        assert!(status.last_error.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disable_while_tracking_finalizes_then_restarts_clean() {
        let (controller, store) = controller(true);
        controller.enable().await.expect("enable");
        start_tracking(&controller).await;
        assert!(controller.inject_distance(2.5).await.expect("inject"));

        let saved = controller.disable().await.expect("disable");
        let saved = saved.expect("trip saved");
        assert!((saved.distance - 2.5).abs() < 1e-9);
        assert_eq!(store.trips().len(), 1);

        let status = controller.status();
        assert!(!status.enabled);
        assert_eq!(status.state, DetectionState::Idle);

        controller.enable().await.expect("re-enable");
        let status = controller.status();
        assert!(status.enabled);
        assert_eq!(status.distance_miles, 0.0);
        assert_eq!(status.confirmations, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn debug_commands_need_debug_mode() {
        let (controller, store) = controller(false);
        controller.enable().await.expect("enable");
        start_tracking(&controller).await;

        assert!(!controller.inject_distance(1.0).await.expect("inject"));
        assert!(controller.force_finish().await.expect("force").is_none());
        assert_eq!(controller.status().state, DetectionState::Tracking);

        controller.set_debug_mode(true).await.expect("debug mode");
        assert!(controller.status().debug_mode);
        assert!(controller.inject_distance(0.5).await.expect("inject"));
        assert!((controller.status().distance_miles - 0.5).abs() < 1e-9);

        let trip = controller.force_finish().await.expect("force");
        assert!(trip.is_some());
        assert_eq!(store.trips().len(), 1);
        assert_eq!(controller.status().state, DetectionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn store_failure_surfaces_in_status() {
        let (controller, store) = controller(true);
        controller.enable().await.expect("enable");
        start_tracking(&controller).await;
        controller.inject_distance(1.0).await.expect("inject");
        store.set_failure(Some("disk full"));

        let err = controller.force_finish().await.expect_err("store failure");
        assert!(matches!(err, DetectorError::StoreFailure(_)));
        let status = controller.status();
        assert_eq!(status.state, DetectionState::Idle);
        assert!(status
            .last_error
            .as_deref()
            .is_some_and(|message| message.contains("disk full")));
        assert!(store.trips().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stale_debounce_ticks_leave_detecting_alone() {
        let (controller, _store) = controller(false);
        controller.enable().await.expect("enable");

        let sink = controller.sink();
        sink.post_motion(MotionSample::driving(Confidence::High));
        wait_for_state(&controller, DetectionState::Detecting).await;

        // Several ticker periods without further samples.
        time::sleep(Duration::from_millis(120)).await;
        let status = controller.status();
        assert_eq!(status.state, DetectionState::Detecting);
        assert_eq!(status.confirmations, 1);

        sink.post_motion(MotionSample::stopped(Confidence::High));
        wait_for_state(&controller, DetectionState::Idle).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn authorization_change_moves_location_feed_to_foreground() {
        let (controller, _store) = controller(false);
        controller.enable().await.expect("enable");
        start_tracking(&controller).await;
        assert_eq!(controller.status().location_updates, LocationUpdates::Background);

        let mut downgraded = PermissionStatus::granted();
        downgraded.location = LocationAuthorization::WhenInUse;
        assert!(controller.sink().post_authorization(downgraded));

        let mut status_rx = controller.subscribe_status();
        time::timeout(
            WAIT,
            status_rx.wait_for(|status| status.location_updates == LocationUpdates::Foreground),
        )
        .await
        .expect("timed out waiting for foreground updates")
        .expect("status channel closed");
        assert_eq!(controller.status().state, DetectionState::Tracking);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn location_error_is_published() {
        let (controller, _store) = controller(false);
        controller.enable().await.expect("enable");
        assert!(controller.sink().post_location_error("GPS signal lost"));

        let mut status_rx = controller.subscribe_status();
        let status = time::timeout(WAIT, status_rx.wait_for(|status| status.last_error.is_some()))
            .await
            .expect("timed out waiting for error")
            .expect("status channel closed")
            .clone();
        assert_eq!(status.last_error.as_deref(), Some("Location error: GPS signal lost"));
        assert_eq!(status.state, DetectionState::Idle);
        assert!(status.enabled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn simulated_trip_runs_through_detector() {
        let (controller, store) = controller(true);
        let mut trips = controller.subscribe_trips();
        controller.enable().await.expect("enable");

        let plan = SimulationPlan {
            motion_interval: Duration::from_millis(5),
            fix_interval: Duration::from_millis(5),
            max_fixes: Some(40),
            finish_with_stop: true,
            seed: Some(42),
            ..SimulationPlan::default()
        };
        controller
            .start_simulated_trip(plan)
            .await
            .expect("simulation");

        let trip = time::timeout(WAIT, trips.recv())
            .await
            .expect("timed out waiting for simulated trip")
            .expect("trip channel closed");
        // 39 steps of 15-45 m each.
        assert!(trip.distance > 0.3 && trip.distance < 1.2, "distance {}", trip.distance);
        assert_eq!(store.trips().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stopping_simulation_finishes_trip() {
        let (controller, store) = controller(true);
        controller.enable().await.expect("enable");

        let plan = SimulationPlan {
            motion_interval: Duration::from_millis(5),
            fix_interval: Duration::from_millis(5),
            seed: Some(9),
            ..SimulationPlan::default()
        };
        controller
            .start_simulated_trip(plan)
            .await
            .expect("simulation");
        wait_for_state(&controller, DetectionState::Tracking).await;
        controller.inject_distance(0.5).await.expect("inject");

        let trip = controller.stop_simulated_trip().await.expect("stop");
        assert!(trip.is_some());
        assert_eq!(store.trips().len(), 1);
        assert_eq!(controller.status().state, DetectionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn simulation_rejected_outside_debug_mode() {
        let (controller, _store) = controller(false);
        controller.enable().await.expect("enable");
        assert!(controller
            .start_simulated_trip(SimulationPlan::default())
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_stops_the_worker() {
        let (controller, _store) = controller(false);
        controller.enable().await.expect("enable");
        let sink = controller.sink();

        controller.shutdown().await.expect("shutdown");
        assert!(!sink.post_motion(MotionSample::driving(Confidence::High)));
        assert!(matches!(
            controller.enable().await,
            Err(DetectorError::RuntimeUnavailable)
        ));
    }
}
