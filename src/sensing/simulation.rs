//! Synthetic drive generator for debug runs.
//!
//! Produces the same motion samples and location fixes a phone would and posts them
//! through [`SensorSink`], so simulated trips go through the real detector.

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::detection::{Confidence, DetectionState, DetectorStatus, LocationFix, MotionSample};

use super::sink::SensorSink;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// San Francisco.
pub const DEFAULT_ORIGIN: (f64, f64) = (37.7749, -122.4194);

/// Per-fix movement in degrees, applied to latitude and longitude independently.
/// Roughly 30 mph at one fix every two seconds.
const STEP_DEGREES: std::ops::RangeInclusive<f64> = 0.0001..=0.0003;

const SIMULATED_ACCURACY_M: f64 = 5.0;

/// tokio intervals reject a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub origin: (f64, f64),
    /// Spacing of the driving samples sent until tracking starts
    pub motion_interval: Duration,
    pub fix_interval: Duration,
    /// Stop after this many fixes; `None` drives until cancelled
    pub max_fixes: Option<usize>,
    /// Send a stationary sample after the last fix so the detector finalizes on its own
    pub finish_with_stop: bool,
    pub seed: Option<u64>,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN,
            motion_interval: Duration::from_secs(1),
            fix_interval: Duration::from_secs(2),
            max_fixes: None,
            finish_with_stop: false,
            seed: None,
        }
    }
}

/// Random-walk route heading north-east from an origin.
#[derive(Debug, Clone)]
pub struct SimulatedRoute {
    lat: f64,
    lon: f64,
    started: bool,
}

impl SimulatedRoute {
    pub fn new(origin: (f64, f64)) -> Self {
        Self {
            lat: origin.0,
            lon: origin.1,
            started: false,
        }
    }

    /// First call returns the origin itself.
    pub fn next_fix<R: Rng>(&mut self, rng: &mut R) -> LocationFix {
        if self.started {
            self.lat += rng.gen_range(STEP_DEGREES);
            self.lon += rng.gen_range(STEP_DEGREES);
        }
        self.started = true;
        LocationFix::new(self.lat, self.lon, SIMULATED_ACCURACY_M)
    }
}

pub async fn simulated_drive(
    sink: SensorSink,
    mut status_rx: watch::Receiver<DetectorStatus>,
    plan: SimulationPlan,
    cancel_token: CancellationToken,
) {
    let mut rng = match plan.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    log_info!("Simulated drive starting");

    let mut motion_ticker = time::interval(plan.motion_interval.max(MIN_INTERVAL));
    motion_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if status_rx.borrow_and_update().state == DetectionState::Tracking {
            break;
        }
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("Simulated drive cancelled before tracking started");
                return;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = motion_ticker.tick() => {
                if !sink.post_motion(MotionSample::driving(Confidence::High)) {
                    return;
                }
            }
        }
    }

    let mut route = SimulatedRoute::new(plan.origin);
    let mut fix_ticker = time::interval(plan.fix_interval.max(MIN_INTERVAL));
    fix_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut posted = 0usize;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("Simulated drive cancelled after {posted} fixes");
                return;
            }
            _ = fix_ticker.tick() => {
                if status_rx.borrow().state != DetectionState::Tracking {
                    log_info!("Detector left tracking; simulated drive ends");
                    return;
                }
                let fix = route.next_fix(&mut rng);
                log_debug!("Simulated fix {:.5},{:.5}", fix.lat, fix.lon);
                if !sink.post_locations(vec![fix]) {
                    return;
                }
                posted += 1;
                if plan.max_fixes.is_some_and(|limit| posted >= limit) {
                    break;
                }
            }
        }
    }

    if plan.finish_with_stop {
        sink.post_motion(MotionSample::stopped(Confidence::High));
    }
    log_info!("Simulated drive finished after {posted} fixes");
}
