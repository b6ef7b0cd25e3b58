use std::sync::mpsc;

use crate::detection::{Command, LocationFix, MotionSample};
use crate::permissions::PermissionStatus;

/// Entry point for host sensor callbacks.
///
/// Clone it into whatever thread the platform delivers on; every post lands in the
/// detector's single queue in arrival order. Posts return `false` once the detector
/// runtime has shut down.
#[derive(Clone)]
pub struct SensorSink {
    sender: mpsc::Sender<Command>,
}

impl SensorSink {
    pub(crate) fn new(sender: mpsc::Sender<Command>) -> Self {
        Self { sender }
    }

    pub fn post_motion(&self, sample: MotionSample) -> bool {
        self.post(Command::Motion(sample))
    }

    /// A platform batch of fixes, integrated in order.
    pub fn post_locations(&self, fixes: Vec<LocationFix>) -> bool {
        if fixes.is_empty() {
            return true;
        }
        self.post(Command::Locations(fixes))
    }

    pub fn post_location_error(&self, message: impl Into<String>) -> bool {
        self.post(Command::LocationError(message.into()))
    }

    pub fn post_authorization(&self, status: PermissionStatus) -> bool {
        self.post(Command::Authorization(status))
    }

    fn post(&self, command: Command) -> bool {
        self.sender.send(command).is_ok()
    }
}
