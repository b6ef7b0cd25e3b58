use std::sync::{Arc, Mutex};

use crate::db::models::Trip;

use super::error::StoreError;

/// Where finished trips are handed off. Called on the detector worker thread.
pub trait TripStore: Send {
    fn insert(&mut self, trip: &Trip) -> Result<(), StoreError>;
}

impl<S: TripStore + ?Sized> TripStore for Box<S> {
    fn insert(&mut self, trip: &Trip) -> Result<(), StoreError> {
        (**self).insert(trip)
    }
}

/// In-memory store. Clones share the same trip list.
#[derive(Debug, Clone, Default)]
pub struct MemoryTripStore {
    trips: Arc<Mutex<Vec<Trip>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trips(&self) -> Vec<Trip> {
        match self.trips.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Makes every following insert fail with `message`, or succeed again with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        let mut guard = match self.fail_with.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = message.map(str::to_string);
    }
}

impl TripStore for MemoryTripStore {
    fn insert(&mut self, trip: &Trip) -> Result<(), StoreError> {
        let failure = match self.fail_with.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(message) = failure {
            return Err(StoreError::new(message));
        }

        let mut guard = self
            .trips
            .lock()
            .map_err(|_| StoreError::new("trip list lock poisoned"))?;
        guard.push(trip.clone());
        Ok(())
    }
}
