//! Trip data models.
//!
//! `Trip` is the persisted mileage log entry. Auto-detected trips start out with the
//! category chosen by the detection config and wait for the user to classify them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detection::FinishedTrip;

pub const AUTO_TRIP_PURPOSE: &str = "Auto-detected trip";
pub const AUTO_TRIP_NOTES: &str = "Automatically recorded";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TripCategory {
    #[default]
    Unclassified,
    Business,
    Personal,
}

impl TripCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripCategory::Unclassified => "Unclassified",
            TripCategory::Business => "Business",
            TripCategory::Personal => "Personal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub date: DateTime<Utc>,
    pub start_odometer: f64,
    pub end_odometer: f64,
    pub distance: f64,
    pub category: TripCategory,
    pub purpose: String,
    pub notes: String,
    pub is_auto_detected: bool,
}

impl Trip {
    /// Builds the log entry for a trip the detector finished.
    pub fn from_finished(finished: &FinishedTrip, category: TripCategory) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date: finished.start_timestamp,
            start_odometer: 0.0,
            end_odometer: 0.0,
            distance: finished.distance_miles,
            category,
            purpose: AUTO_TRIP_PURPOSE.to_string(),
            notes: AUTO_TRIP_NOTES.to_string(),
            is_auto_detected: finished.auto_detected,
        }
    }

    /// Entry typed in by the user. Distance comes from the odometer readings.
    pub fn manual(
        date: DateTime<Utc>,
        start_odometer: f64,
        end_odometer: f64,
        category: TripCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date,
            start_odometer,
            end_odometer,
            distance: end_odometer - start_odometer,
            category,
            purpose: String::new(),
            notes: String::new(),
            is_auto_detected: false,
        }
    }

    /// Tax deduction at `rate` per mile. Only business trips are deductible.
    pub fn deductible_amount(&self, rate: f64) -> f64 {
        match self.category {
            TripCategory::Business => self.distance * rate,
            _ => 0.0,
        }
    }
}
