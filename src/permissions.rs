//! Authorization status reported by the host platform.
//!
//! The detector only reads these values. Asking the user for access is the host's job
//! and happens through [`PermissionProvider::request_permissions`].

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum LocationAuthorization {
    #[default]
    NotDetermined,
    Restricted,
    Denied,
    WhenInUse,
    Always,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MotionAuthorization {
    #[default]
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub location: LocationAuthorization,
    pub motion: MotionAuthorization,
}

impl PermissionStatus {
    pub fn granted() -> Self {
        Self {
            location: LocationAuthorization::Always,
            motion: MotionAuthorization::Authorized,
        }
    }

    /// Background tracking needs Always location access.
    pub fn location_authorized(&self) -> bool {
        self.location == LocationAuthorization::Always
    }

    pub fn motion_authorized(&self) -> bool {
        self.motion == MotionAuthorization::Authorized
    }

    pub fn has_required(&self) -> bool {
        self.location_authorized() && self.motion_authorized()
    }
}

/// What the platform offers at the moment detection is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformAvailability {
    pub activity_available: bool,
    pub permissions: PermissionStatus,
}

pub trait PermissionProvider: Send + Sync {
    fn status(&self) -> PermissionStatus;

    /// Whether the device offers motion-activity classification at all.
    fn activity_available(&self) -> bool;

    fn request_permissions(&self);

    fn availability(&self) -> PlatformAvailability {
        PlatformAvailability {
            activity_available: self.activity_available(),
            permissions: self.status(),
        }
    }
}

/// Fixed permission answers for headless runs and tests.
#[derive(Debug)]
pub struct StaticPermissions {
    status: RwLock<PermissionStatus>,
    activity_available: bool,
}

impl StaticPermissions {
    pub fn new(status: PermissionStatus, activity_available: bool) -> Self {
        Self {
            status: RwLock::new(status),
            activity_available,
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::granted(), true)
    }

    pub fn set_status(&self, status: PermissionStatus) {
        match self.status.write() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}

impl PermissionProvider for StaticPermissions {
    fn status(&self) -> PermissionStatus {
        match self.status.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn activity_available(&self) -> bool {
        self.activity_available
    }

    fn request_permissions(&self) {
        // Static answers; a real host would prompt here.
        log::info!("Permission request ignored by static provider");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_in_use_is_not_enough() {
        let status = PermissionStatus {
            location: LocationAuthorization::WhenInUse,
            motion: MotionAuthorization::Authorized,
        };
        assert!(!status.has_required());
        assert!(PermissionStatus::granted().has_required());
    }

    #[test]
    fn static_provider_reports_updates() {
        let provider = StaticPermissions::new(PermissionStatus::default(), true);
        assert!(!provider.availability().permissions.has_required());

        provider.set_status(PermissionStatus::granted());
        assert!(provider.availability().permissions.has_required());
        assert!(provider.availability().activity_available);
    }
}
