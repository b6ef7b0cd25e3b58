use chrono::{DateTime, Utc};

use crate::db::models::Trip;
use crate::permissions::{LocationAuthorization, PermissionStatus, PlatformAvailability};

use super::{
    accumulator::{FixOutcome, TripAccumulator},
    config::DetectionConfig,
    debounce::ConfirmationDebounce,
    error::DetectorError,
    state::{DetectionState, DetectorStatus, LocationUpdates},
    store::TripStore,
    types::{FinishedTrip, LocationFix, MotionSample},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Trip detection state machine.
///
/// Every method runs to completion and leaves the machine consistent. Callers must
/// serialize access; [`super::DetectionController`] does that with a single worker queue.
pub struct TripDetector<S: TripStore> {
    config: DetectionConfig,
    store: S,
    state: DetectionState,
    enabled: bool,
    debug_mode: bool,
    debounce: ConfirmationDebounce,
    trip: TripAccumulator,
    permissions: PermissionStatus,
    last_error: Option<String>,
}

impl<S: TripStore> TripDetector<S> {
    pub fn new(config: DetectionConfig, store: S) -> Self {
        let debounce = ConfirmationDebounce::new(config.required_confirmations);
        let debug_mode = config.debug_mode;
        Self {
            config,
            store,
            state: DetectionState::Idle,
            enabled: false,
            debug_mode,
            debounce,
            trip: TripAccumulator::new(),
            permissions: PermissionStatus::default(),
            last_error: None,
        }
    }

    pub fn enable(&mut self, availability: PlatformAvailability) -> Result<(), DetectorError> {
        self.permissions = availability.permissions;
        if self.enabled {
            return Ok(());
        }

        if !availability.activity_available {
            return Err(self.report(DetectorError::SensorUnavailable));
        }
        if !availability.permissions.has_required() {
            return Err(self.report(DetectorError::PermissionDenied(availability.permissions)));
        }

        self.last_error = None;
        self.enabled = true;
        self.return_to_idle();
        log_info!("Trip detection enabled");
        Ok(())
    }

    /// Stops detection. A trip in progress is finalized before the detector goes idle.
    pub fn disable(&mut self) -> Result<Option<Trip>, DetectorError> {
        if !self.enabled && self.state == DetectionState::Idle {
            return Ok(None);
        }

        self.debounce.stop_timer();
        let result = self.finalize();
        self.enabled = false;
        log_info!("Trip detection disabled");
        result
    }

    pub fn on_motion_sample(&mut self, sample: MotionSample) -> Result<Option<Trip>, DetectorError> {
        if !self.enabled {
            return Ok(None);
        }

        match self.state {
            DetectionState::Idle => {
                if sample.qualifies_as_driving() {
                    self.start_detecting();
                    if self.debounce.is_confirmed() {
                        self.start_tracking(sample.timestamp);
                    }
                }
            }
            DetectionState::Detecting => {
                if sample.qualifies_as_driving() {
                    if self.debounce.confirm() {
                        self.start_tracking(sample.timestamp);
                    } else {
                        log_debug!(
                            "Driving confirmation {}/{}",
                            self.debounce.count(),
                            self.debounce.required()
                        );
                    }
                } else if !sample.automotive {
                    log_info!("Driving not confirmed; back to idle");
                    self.return_to_idle();
                }
            }
            DetectionState::Tracking => {
                if sample.indicates_stop() {
                    log_info!("Vehicle stopped; finalizing trip");
                    return self.finalize();
                }
            }
            DetectionState::Saving => {}
        }

        Ok(None)
    }

    /// Integrates a fix while tracking. Returns `None` when the fix was ignored because
    /// the detector is not tracking.
    pub fn on_location_fix(&mut self, fix: LocationFix) -> Option<FixOutcome> {
        if !self.enabled || self.state != DetectionState::Tracking {
            return None;
        }

        let outcome = self.trip.accept(fix, &self.config);
        if let FixOutcome::RejectedInaccurate = outcome {
            log_debug!("Skipping inaccurate fix ({:.1} m)", fix.accuracy_m);
        }
        Some(outcome)
    }

    /// Debounce timer event. Re-checks confirmation progress while detecting.
    pub fn on_debounce_tick(&mut self) -> bool {
        if !self.enabled || !self.debounce.tick() {
            return false;
        }

        if self.state == DetectionState::Detecting && self.debounce.is_confirmed() {
            self.start_tracking(Utc::now());
        }
        true
    }

    pub fn on_location_error(&mut self, message: &str) {
        log_warn!("Location error: {message}");
        self.last_error = Some(format!("Location error: {message}"));
    }

    pub fn on_authorization_changed(&mut self, permissions: PermissionStatus) {
        self.permissions = permissions;
    }

    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.debug_mode = enabled;
    }

    /// Debug only: adds miles to the trip being tracked.
    pub fn inject_distance(&mut self, miles: f64) -> bool {
        if !self.debug_mode || self.state != DetectionState::Tracking {
            return false;
        }
        if !miles.is_finite() || miles <= 0.0 {
            return false;
        }
        self.trip.inject(miles);
        true
    }

    /// Debug only: ends the current trip as if the vehicle had stopped.
    pub fn force_finish(&mut self) -> Result<Option<Trip>, DetectorError> {
        if !self.debug_mode {
            log_warn!("force_finish ignored outside debug mode");
            return Ok(None);
        }
        self.finalize()
    }

    /// Turns the tracked trip into a stored record (or drops it when too short) and
    /// returns to idle. No-op when idle.
    pub fn finalize(&mut self) -> Result<Option<Trip>, DetectorError> {
        match self.state {
            DetectionState::Idle => return Ok(None),
            DetectionState::Detecting | DetectionState::Saving => {
                self.return_to_idle();
                return Ok(None);
            }
            DetectionState::Tracking => {}
        }

        self.state = DetectionState::Saving;
        let distance = self.trip.distance_miles();

        let result = if distance > self.config.min_trip_miles {
            let started_at = self.trip.started_at().unwrap_or_else(Utc::now);
            let finished = FinishedTrip::auto_detected(started_at, distance);
            let trip = Trip::from_finished(&finished, self.config.auto_trip_category);

            match self.store.insert(&trip) {
                Ok(()) => {
                    log_info!("Saved trip {} ({:.2} mi)", trip.id, trip.distance);
                    Ok(Some(trip))
                }
                Err(err) => {
                    log_error!("Failed to save trip ({:.2} mi): {err}", distance);
                    Err(self.report(DetectorError::StoreFailure(err)))
                }
            }
        } else {
            log_info!("Discarding trip below minimum distance ({:.3} mi)", distance);
            Ok(None)
        };

        self.return_to_idle();
        result
    }

    pub fn status(&self) -> DetectorStatus {
        DetectorStatus {
            enabled: self.enabled,
            state: self.state,
            distance_miles: self.trip.distance_miles(),
            confirmations: self.debounce.count(),
            last_error: self.last_error.clone(),
            location_updates: self.location_updates(),
            debug_mode: self.debug_mode,
        }
    }

    pub fn location_updates(&self) -> LocationUpdates {
        if self.state != DetectionState::Tracking {
            return LocationUpdates::Off;
        }
        if self.permissions.location == LocationAuthorization::Always {
            LocationUpdates::Background
        } else {
            LocationUpdates::Foreground
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn debounce(&self) -> &ConfirmationDebounce {
        &self.debounce
    }

    pub fn accumulator(&self) -> &TripAccumulator {
        &self.trip
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn start_detecting(&mut self) {
        self.trip.reset();
        self.debounce.begin();
        self.state = DetectionState::Detecting;
        log_info!("Possible drive; confirming");
    }

    fn start_tracking(&mut self, started_at: DateTime<Utc>) {
        self.debounce.stop_timer();
        self.trip.begin(started_at);
        self.state = DetectionState::Tracking;
        log_info!("Driving confirmed; tracking trip from {}", started_at.to_rfc3339());
    }

    fn return_to_idle(&mut self) {
        self.debounce.clear();
        self.trip.reset();
        self.state = DetectionState::Idle;
    }

    fn report(&mut self, err: DetectorError) -> DetectorError {
        self.last_error = Some(err.to_string());
        err
    }
}
