use std::time::Duration;

use crate::db::models::TripCategory;

/// Detection policy. Built once and handed to the detector at construction.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Fixes with horizontal accuracy at or above this radius (meters) are discarded
    pub rejection_accuracy_m: f64,

    /// Consecutive qualifying motion samples needed before tracking starts
    pub required_confirmations: u32,

    /// Period of the debounce tick while detecting
    pub debounce_interval: Duration,

    /// Trips at or below this distance are dropped on finalize
    pub min_trip_miles: f64,

    pub meters_per_mile: f64,

    /// Category assigned to auto-detected trips until the user classifies them
    pub auto_trip_category: TripCategory,

    /// Enables the manual distance / force-finish entry points
    pub debug_mode: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rejection_accuracy_m: 50.0,
            required_confirmations: 3,
            debounce_interval: Duration::from_secs(10),
            min_trip_miles: 0.1,
            meters_per_mile: 1609.34,
            auto_trip_category: TripCategory::Unclassified,
            debug_mode: false,
        }
    }
}

impl DetectionConfig {
    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }
}
