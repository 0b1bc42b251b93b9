//! Shared test doubles for the ride-sharing services.

mod clock;
mod gateway;
mod publisher;
mod repository;
mod rng;

pub use clock::FixedClock;
pub use gateway::StubPaymentGateway;
pub use publisher::{FailingPublisher, RecordingPublisher};
pub use repository::{EmptyEventRepository, FailingEventRepository, InMemoryEventRepository};
pub use rng::{MockRng, SequenceRng};
