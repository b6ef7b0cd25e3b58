use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DetectionState {
    #[default]
    Idle,
    Detecting,
    Tracking,
    Saving,
}

impl DetectionState {
    pub fn label(&self) -> &'static str {
        match self {
            DetectionState::Idle => "Waiting",
            DetectionState::Detecting => "Detecting...",
            DetectionState::Tracking => "Tracking",
            DetectionState::Saving => "Saving...",
        }
    }
}

/// How the host should run its location feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum LocationUpdates {
    #[default]
    Off,
    Foreground,
    /// Only with Always location authorization.
    Background,
}

/// Snapshot consumed by the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectorStatus {
    pub enabled: bool,
    pub state: DetectionState,
    pub distance_miles: f64,
    pub confirmations: u32,
    pub last_error: Option<String>,
    pub location_updates: LocationUpdates,
    pub debug_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_for_the_ui() {
        let status = DetectorStatus {
            enabled: true,
            state: DetectionState::Tracking,
            distance_miles: 1.5,
            location_updates: LocationUpdates::Background,
            ..DetectorStatus::default()
        };
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["state"], "tracking");
        assert_eq!(json["distanceMiles"], 1.5);
        assert_eq!(json["locationUpdates"], "background");
        assert!(json["lastError"].is_null());
        assert_eq!(DetectionState::Tracking.label(), "Tracking");
        assert_eq!(DetectionState::default().label(), "Waiting");
    }
}
