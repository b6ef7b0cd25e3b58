//! Automatic trip detection.
//!
//! Motion-activity samples confirm that the user is driving, location fixes measure how
//! far, and a stationary sample ends the trip. [`TripDetector`] is the synchronous state
//! machine; [`DetectionController`] runs it on a single worker queue fed by sensor
//! callbacks, the debounce ticker and user commands.

pub mod accumulator;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod detector;
pub mod distance;
pub mod error;
pub mod state;
pub mod store;
pub mod types;

pub(crate) use controller::Command;

pub use accumulator::{FixOutcome, TripAccumulator};
pub use config::DetectionConfig;
pub use controller::DetectionController;
pub use debounce::ConfirmationDebounce;
pub use detector::TripDetector;
pub use error::{DetectorError, StoreError};
pub use state::{DetectionState, DetectorStatus, LocationUpdates};
pub use store::{MemoryTripStore, TripStore};
pub use types::{Confidence, FinishedTrip, LocationFix, MotionSample};
