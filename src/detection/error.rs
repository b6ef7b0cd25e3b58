use thiserror::Error;

use crate::permissions::PermissionStatus;

/// Failure reported by the trip store hand-off.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Errors surfaced by the detector. Malformed sensor input is never one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectorError {
    #[error("Motion activity not available on this device")]
    SensorUnavailable,

    #[error("Location (Always) and motion access are required: location {:?}, motion {:?}", .0.location, .0.motion)]
    PermissionDenied(PermissionStatus),

    #[error("Failed to save trip: {0}")]
    StoreFailure(#[from] StoreError),

    #[error("detector runtime is not running")]
    RuntimeUnavailable,
}
