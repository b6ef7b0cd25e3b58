use chrono::{DateTime, Utc};

use super::{
    config::DetectionConfig,
    distance::{haversine_meters, meters_to_miles, path_miles},
    types::LocationFix,
};

/// What happened to a fix handed to [`TripAccumulator::accept`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// Fix was used; `increment_miles` is zero for the first fix of a trip.
    Accepted { increment_miles: f64 },
    /// Horizontal accuracy at or above the rejection radius.
    RejectedInaccurate,
    /// Non-finite coordinates or accuracy.
    RejectedInvalid,
}

/// Distance state of the trip currently being tracked.
#[derive(Debug, Clone, Default)]
pub struct TripAccumulator {
    started_at: Option<DateTime<Utc>>,
    accepted: Vec<LocationFix>,
    distance_miles: f64,
    /// Miles added through the debug path; not backed by fixes.
    injected_miles: f64,
}

impl TripAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, started_at: DateTime<Utc>) {
        self.reset();
        self.started_at = Some(started_at);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn accept(&mut self, fix: LocationFix, config: &DetectionConfig) -> FixOutcome {
        if !fix.lat.is_finite() || !fix.lon.is_finite() || fix.accuracy_m.is_nan() {
            return FixOutcome::RejectedInvalid;
        }
        if fix.accuracy_m >= config.rejection_accuracy_m {
            return FixOutcome::RejectedInaccurate;
        }

        let increment_miles = match self.accepted.last() {
            Some(previous) => meters_to_miles(haversine_meters(previous, &fix), config.meters_per_mile),
            None => 0.0,
        };
        self.distance_miles += increment_miles;
        self.accepted.push(fix);

        FixOutcome::Accepted { increment_miles }
    }

    pub fn inject(&mut self, miles: f64) {
        self.injected_miles += miles;
        self.distance_miles += miles;
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn distance_miles(&self) -> f64 {
        self.distance_miles
    }

    pub fn last_accepted(&self) -> Option<&LocationFix> {
        self.accepted.last()
    }

    pub fn accepted_fixes(&self) -> &[LocationFix] {
        &self.accepted
    }

    /// Distance re-derived from the accepted fixes plus any injected miles.
    pub fn recomputed_miles(&self, meters_per_mile: f64) -> f64 {
        path_miles(&self.accepted, meters_per_mile) + self.injected_miles
    }

    pub fn is_empty(&self) -> bool {
        self.started_at.is_none() && self.accepted.is_empty() && self.distance_miles == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fix(lat: f64, lon: f64, accuracy_m: f64) -> LocationFix {
        LocationFix::new(lat, lon, accuracy_m)
    }

    #[test]
    fn first_fix_contributes_nothing() {
        let config = DetectionConfig::default();
        let mut acc = TripAccumulator::new();
        acc.begin(Utc::now());

        let outcome = acc.accept(fix(37.0, -122.0, 5.0), &config);
        assert_eq!(outcome, FixOutcome::Accepted { increment_miles: 0.0 });
        assert_eq!(acc.distance_miles(), 0.0);
        assert!(acc.last_accepted().is_some());
    }

    #[test]
    fn inaccurate_fix_is_rejected_at_threshold() {
        let config = DetectionConfig::default();
        let mut acc = TripAccumulator::new();
        acc.accept(fix(37.0, -122.0, 5.0), &config);

        let outcome = acc.accept(fix(37.1, -122.0, 50.0), &config);
        assert_eq!(outcome, FixOutcome::RejectedInaccurate);
        assert_eq!(acc.accepted_fixes().len(), 1);
        assert_eq!(acc.distance_miles(), 0.0);
        assert_eq!(acc.last_accepted().map(|f| f.lat), Some(37.0));
    }

    #[test]
    fn zero_and_negative_accuracy_are_tolerated() {
        let config = DetectionConfig::default();
        let mut acc = TripAccumulator::new();
        assert!(matches!(acc.accept(fix(1.0, 1.0, 0.0), &config), FixOutcome::Accepted { .. }));
        assert!(matches!(acc.accept(fix(1.0, 1.001, -3.0), &config), FixOutcome::Accepted { .. }));
        assert!(acc.distance_miles() > 0.0);
    }

    #[test]
    fn nan_inputs_are_dropped() {
        let config = DetectionConfig::default();
        let mut acc = TripAccumulator::new();
        assert_eq!(acc.accept(fix(f64::NAN, 1.0, 5.0), &config), FixOutcome::RejectedInvalid);
        assert_eq!(acc.accept(fix(1.0, 1.0, f64::NAN), &config), FixOutcome::RejectedInvalid);
        assert!(acc.last_accepted().is_none());
    }

    #[test]
    fn duplicate_fix_still_replaces_last_accepted() {
        let config = DetectionConfig::default();
        let mut acc = TripAccumulator::new();
        let now = Utc::now();
        acc.accept(LocationFix::at(1.0, 1.0, 5.0, now), &config);
        let outcome = acc.accept(LocationFix::at(1.0, 1.0, 4.0, now), &config);

        assert_eq!(outcome, FixOutcome::Accepted { increment_miles: 0.0 });
        assert_eq!(acc.accepted_fixes().len(), 2);
        assert_eq!(acc.last_accepted().map(|f| f.accuracy_m), Some(4.0));
    }

    #[test]
    fn reset_clears_everything() {
        let config = DetectionConfig::default();
        let mut acc = TripAccumulator::new();
        acc.begin(Utc::now());
        acc.accept(fix(1.0, 1.0, 5.0), &config);
        acc.accept(fix(1.1, 1.0, 5.0), &config);
        acc.inject(2.0);

        acc.reset();
        assert!(acc.is_empty());
        assert!(acc.started_at().is_none());
        assert!(acc.last_accepted().is_none());
    }

    #[test]
    fn injected_miles_are_part_of_the_recomputation() {
        let config = DetectionConfig::default();
        let mut acc = TripAccumulator::new();
        acc.accept(fix(1.0, 1.0, 5.0), &config);
        acc.inject(0.5);
        acc.accept(fix(1.01, 1.0, 5.0), &config);

        let recomputed = acc.recomputed_miles(config.meters_per_mile);
        assert!((recomputed - acc.distance_miles()).abs() < 1e-9);
    }

    fn arb_fix() -> impl Strategy<Value = (f64, f64, f64)> {
        (-60.0f64..60.0, -170.0f64..170.0, -5.0f64..120.0)
    }

    proptest! {
        #[test]
        fn running_total_matches_recomputation(raw in prop::collection::vec(arb_fix(), 0..40)) {
            let config = DetectionConfig::default();
            let mut acc = TripAccumulator::new();
            for (lat, lon, accuracy) in raw {
                acc.accept(fix(lat, lon, accuracy), &config);
            }
            let recomputed = acc.recomputed_miles(config.meters_per_mile);
            let tolerance = 1e-9 * acc.distance_miles().max(1.0);
            prop_assert!((recomputed - acc.distance_miles()).abs() <= tolerance);
        }

        #[test]
        fn inaccurate_fixes_never_change_state(
            raw in prop::collection::vec(arb_fix(), 1..20),
            bad_accuracy in 50.0f64..10_000.0,
            lat in -60.0f64..60.0,
            lon in -170.0f64..170.0,
        ) {
            let config = DetectionConfig::default();
            let mut acc = TripAccumulator::new();
            for (lat, lon, accuracy) in raw {
                acc.accept(fix(lat, lon, accuracy), &config);
            }
            let distance = acc.distance_miles();
            let last = acc.last_accepted().copied();

            prop_assert_eq!(acc.accept(fix(lat, lon, bad_accuracy), &config), FixOutcome::RejectedInaccurate);
            prop_assert_eq!(acc.distance_miles(), distance);
            prop_assert_eq!(acc.last_accepted().copied(), last);
        }

        #[test]
        fn distance_never_decreases(raw in prop::collection::vec(arb_fix(), 0..40)) {
            let config = DetectionConfig::default();
            let mut acc = TripAccumulator::new();
            let mut previous = 0.0;
            for (lat, lon, accuracy) in raw {
                acc.accept(fix(lat, lon, accuracy), &config);
                prop_assert!(acc.distance_miles() >= previous);
                previous = acc.distance_miles();
            }
        }
    }
}
