//! The registry of online drivers.
//!
//! Drivers are kept in memory; a restart empties the registry and drivers
//! register again. Matching is uniform among drivers of a package and sticky
//! per trip for as long as the trip stays among the most recent assignments.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use rideshare_core::rng::DeterministicRng;
use thiserror::Error;
use uuid::Uuid;

/// An online driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Driver {
    /// Driver identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Vehicle plate.
    pub car_plate: String,
    /// Ride package the vehicle serves.
    pub package_slug: String,
}

/// Registry failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A required driver field was blank.
    #[error("driver {field} must not be empty")]
    MissingField {
        /// The blank field.
        field: &'static str,
    },

    /// No driver with this ID is registered.
    #[error("driver {0} is not registered")]
    UnknownDriver(String),
}

/// Assignments remembered when no capacity is configured. Redelivery of a
/// `trip.created` happens within seconds, far inside this many newer trips.
pub const DEFAULT_ASSIGNMENT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

#[derive(Debug)]
struct Drivers {
    by_id: BTreeMap<String, Driver>,
    /// Trip → driver ID, least recently matched evicted first.
    assignments: LruCache<Uuid, String>,
}

/// Online drivers plus the trip → driver assignments made so far.
pub struct DriverRegistry {
    drivers: Mutex<Drivers>,
    rng: Arc<Mutex<dyn DeterministicRng + Send>>,
}

impl DriverRegistry {
    /// Creates an empty registry drawing from `rng`.
    #[must_use]
    pub fn new(rng: Arc<Mutex<dyn DeterministicRng + Send>>) -> Self {
        Self::with_assignment_capacity(rng, DEFAULT_ASSIGNMENT_CAPACITY)
    }

    /// Creates an empty registry that remembers at most `capacity` trip
    /// assignments.
    #[must_use]
    pub fn with_assignment_capacity(
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        capacity: NonZeroUsize,
    ) -> Self {
        Self {
            drivers: Mutex::new(Drivers {
                by_id: BTreeMap::new(),
                assignments: LruCache::new(capacity),
            }),
            rng,
        }
    }

    /// Adds or replaces a driver.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::MissingField` if any field is blank.
    pub fn register(&self, driver: Driver) -> Result<Driver, RegistryError> {
        for (field, value) in [
            ("id", &driver.id),
            ("name", &driver.name),
            ("car_plate", &driver.car_plate),
            ("package_slug", &driver.package_slug),
        ] {
            if value.trim().is_empty() {
                return Err(RegistryError::MissingField { field });
            }
        }

        let mut drivers = self.lock();
        drivers.by_id.insert(driver.id.clone(), driver.clone());
        Ok(driver)
    }

    /// Removes a driver. Trips already assigned keep their assignment record
    /// but will not be re-announced with this driver.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownDriver` if no such driver is online.
    pub fn unregister(&self, driver_id: &str) -> Result<Driver, RegistryError> {
        let mut drivers = self.lock();
        let removed = drivers
            .by_id
            .remove(driver_id)
            .ok_or_else(|| RegistryError::UnknownDriver(driver_id.to_owned()))?;
        let stale: Vec<Uuid> = drivers
            .assignments
            .iter()
            .filter(|(_, assigned)| assigned.as_str() == driver_id)
            .map(|(trip_id, _)| *trip_id)
            .collect();
        for trip_id in stale {
            drivers.assignments.pop(&trip_id);
        }
        Ok(removed)
    }

    /// Returns the driver for `trip_id`, choosing one if none was chosen yet.
    ///
    /// A repeated call for the same trip returns the same driver while that
    /// driver stays online and the assignment has not been evicted. Returns
    /// `None` if nobody serves `package_slug`.
    pub fn match_driver(&self, trip_id: Uuid, package_slug: &str) -> Option<Driver> {
        let mut guard = self.lock();
        let drivers = &mut *guard;

        if let Some(existing) = drivers
            .assignments
            .get(&trip_id)
            .and_then(|id| drivers.by_id.get(id))
        {
            return Some(existing.clone());
        }

        let candidates: Vec<&Driver> = drivers
            .by_id
            .values()
            .filter(|d| d.package_slug == package_slug)
            .collect();
        let index = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_index(candidates.len())?;
        let chosen = candidates.get(index).copied().cloned()?;

        drivers.assignments.put(trip_id, chosen.id.clone());
        Some(chosen)
    }

    /// Number of trip assignments currently remembered.
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.lock().assignments.len()
    }

    /// Number of online drivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    /// Returns `true` when no driver is online.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Drivers> {
        self.drivers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
