//! Shared application state.

use std::sync::Arc;

use rideshare_core::clock::Clock;
use rideshare_core::lock::KeyedLocks;
use rideshare_core::repository::EventRepository;
use rideshare_messaging::bus::Publisher;

use crate::domain::pricing::{
    FareEstimator, PackageFareEstimator, RoutePlanner, StraightLineRoutePlanner,
};

/// Application state shared by HTTP handlers, RPC handlers and the consumer.
#[derive(Clone)]
pub struct AppState {
    /// Clock for event timestamps.
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// Event repository for loading and persisting trip streams.
    pub event_repository: Arc<dyn EventRepository>,
    /// Broker publisher.
    pub publisher: Arc<dyn Publisher>,
    /// Route planning collaborator.
    pub route_planner: Arc<dyn RoutePlanner>,
    /// Fare estimation collaborator.
    pub fare_estimator: Arc<dyn FareEstimator>,
    /// Per-trip locks shared with the consumer.
    pub locks: Arc<KeyedLocks>,
}

impl AppState {
    /// Create new application state with the default pricing collaborators.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        event_repository: Arc<dyn EventRepository>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            clock,
            event_repository,
            publisher,
            route_planner: Arc::new(StraightLineRoutePlanner::default()),
            fare_estimator: Arc::new(PackageFareEstimator::default()),
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Replaces the pricing collaborators.
    #[must_use]
    pub fn with_pricing(
        mut self,
        route_planner: Arc<dyn RoutePlanner>,
        fare_estimator: Arc<dyn FareEstimator>,
    ) -> Self {
        self.route_planner = route_planner;
        self.fare_estimator = fare_estimator;
        self
    }
}
