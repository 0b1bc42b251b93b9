//! Shared application state.

use std::sync::Arc;

use rideshare_core::clock::Clock;
use rideshare_core::lock::KeyedLocks;
use rideshare_core::repository::EventRepository;
use rideshare_messaging::bus::Publisher;

use crate::gateway::GatewayAdapter;

/// Application state shared by the RPC handlers and the orchestrator.
#[derive(Clone)]
pub struct AppState {
    /// Clock for event timestamps.
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// Event repository for payment session streams.
    pub event_repository: Arc<dyn EventRepository>,
    /// Broker publisher.
    pub publisher: Arc<dyn Publisher>,
    /// Provider access with the mock fallback.
    pub gateway: Arc<GatewayAdapter>,
    /// Per-trip locks.
    pub locks: Arc<KeyedLocks>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        event_repository: Arc<dyn EventRepository>,
        publisher: Arc<dyn Publisher>,
        gateway: GatewayAdapter,
    ) -> Self {
        Self {
            clock,
            event_repository,
            publisher,
            gateway: Arc::new(gateway),
            locks: Arc::new(KeyedLocks::new()),
        }
    }
}
