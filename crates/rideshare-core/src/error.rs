//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type shared by every service in the saga.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Bad input. Never retried; surfaced to callers as a 4xx.
    #[error("validation error: {0}")]
    Validation(String),

    /// A broker, store, pricing or gateway dependency is unavailable.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// The event was already applied; the idempotency check short-circuited.
    #[error("duplicate event for aggregate {aggregate_id}: {reason}")]
    DuplicateEvent {
        /// The aggregate the duplicate targeted.
        aggregate_id: Uuid,
        /// Why the event was considered a duplicate.
        reason: String,
    },

    /// The event requires a state the aggregate has not reached yet.
    #[error("out-of-order event for aggregate {aggregate_id}: {reason}")]
    OutOfOrder {
        /// The aggregate the event targeted.
        aggregate_id: Uuid,
        /// Which precondition was not met.
        reason: String,
    },

    /// A command asked for a transition the state machine does not allow.
    #[error("invalid transition on aggregate {aggregate_id}: {from} -> {to}")]
    InvalidTransition {
        /// The aggregate that rejected the transition.
        aggregate_id: Uuid,
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },

    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },
}

impl DomainError {
    /// Returns `true` if retrying the same input may succeed later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Dependency(_) | Self::ConcurrencyConflict { .. } | Self::OutOfOrder { .. }
        )
    }

    /// Shorthand for building a `DuplicateEvent` error.
    pub fn duplicate(aggregate_id: Uuid, reason: impl Into<String>) -> Self {
        Self::DuplicateEvent {
            aggregate_id,
            reason: reason.into(),
        }
    }

    /// Shorthand for building an `OutOfOrder` error.
    pub fn out_of_order(aggregate_id: Uuid, reason: impl Into<String>) -> Self {
        Self::OutOfOrder {
            aggregate_id,
            reason: reason.into(),
        }
    }
}
