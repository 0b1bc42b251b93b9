//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the persisted version (number of events applied from storage).
    fn version(&self) -> i64;

    /// Apply an event to mutate internal state (used during reconstitution
    /// and right after a command records a new event).
    fn apply(&mut self, event: &Self::Event);

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self);

    /// Returns `true` when no event has ever been applied.
    fn is_new(&self) -> bool {
        self.version() == 0 && self.uncommitted_events().is_empty()
    }
}
