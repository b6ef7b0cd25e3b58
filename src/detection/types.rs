use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence attached to a motion classification. Ordered low < medium < high.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn above_low(self) -> bool {
        self > Confidence::Low
    }
}

/// One motion-activity classification delivered by the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MotionSample {
    pub automotive: bool,
    pub stationary: bool,
    pub confidence: Confidence,
    pub timestamp: DateTime<Utc>,
}

impl MotionSample {
    pub fn new(automotive: bool, stationary: bool, confidence: Confidence) -> Self {
        Self::at(automotive, stationary, confidence, Utc::now())
    }

    pub fn at(
        automotive: bool,
        stationary: bool,
        confidence: Confidence,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            automotive,
            stationary,
            confidence,
            timestamp,
        }
    }

    pub fn driving(confidence: Confidence) -> Self {
        Self::new(true, false, confidence)
    }

    pub fn stopped(confidence: Confidence) -> Self {
        Self::new(false, true, confidence)
    }

    /// Sample that counts toward (or keeps) a driving classification.
    pub fn qualifies_as_driving(&self) -> bool {
        self.automotive && self.confidence.above_low()
    }

    /// Sample that ends an active trip.
    pub fn indicates_stop(&self) -> bool {
        !self.automotive && self.stationary && self.confidence.above_low()
    }
}

/// A geolocation fix. `accuracy_m` is the horizontal accuracy radius in meters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub lat: f64,
    pub lon: f64,
    pub accuracy_m: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(lat: f64, lon: f64, accuracy_m: f64) -> Self {
        Self::at(lat, lon, accuracy_m, Utc::now())
    }

    pub fn at(lat: f64, lon: f64, accuracy_m: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            lat,
            lon,
            accuracy_m,
            timestamp,
        }
    }
}

/// Output of a successful finalize: what the trip store receives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinishedTrip {
    pub start_timestamp: DateTime<Utc>,
    pub distance_miles: f64,
    pub auto_detected: bool,
}

impl FinishedTrip {
    pub fn auto_detected(start_timestamp: DateTime<Utc>, distance_miles: f64) -> Self {
        Self {
            start_timestamp,
            distance_miles,
            auto_detected: true,
        }
    }
}
