//! Publisher and consumer ports plus acknowledgement rules.

use std::time::Duration;

use async_trait::async_trait;
use rideshare_core::error::DomainError;
use tracing::{debug, error, info, warn};

use crate::envelope::Envelope;
use crate::error::MessagingError;
use crate::supervisor::Backoff;

/// Publishes envelopes to the broker.
///
/// One handle is shared by every task in a process.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `envelope` and waits for the broker to confirm it.
    async fn publish(&self, envelope: &Envelope) -> Result<(), MessagingError>;
}

/// Handles envelopes delivered from one queue.
///
/// Implementations must be idempotent: the broker may deliver the same
/// envelope more than once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Applies the envelope's effect. Acknowledgement follows from the result
    /// via [`Disposition::from_result`].
    async fn handle(&self, envelope: &Envelope) -> Result<(), DomainError>;
}

/// What to tell the broker after handling a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed (or already processed). Remove from the queue.
    Ack,
    /// Transient failure. Put back for redelivery.
    Requeue,
    /// Permanent failure. Remove without redelivery.
    Reject,
}

impl Disposition {
    /// Maps a handler result to a broker action.
    #[must_use]
    pub fn from_result(result: &Result<(), DomainError>) -> Self {
        match result {
            Ok(()) | Err(DomainError::DuplicateEvent { .. }) => Self::Ack,
            Err(err) if err.is_transient() => Self::Requeue,
            Err(_) => Self::Reject,
        }
    }
}

/// Runs `handler` on `envelope`, logs the outcome and returns the disposition.
pub async fn dispatch(handler: &dyn EventHandler, envelope: &Envelope) -> Disposition {
    let result = handler.handle(envelope).await;
    let disposition = Disposition::from_result(&result);

    match &result {
        Ok(()) => debug!(
            handler = handler.name(),
            topic = envelope.topic(),
            message_id = %envelope.message_id(),
            "handled envelope"
        ),
        Err(err @ DomainError::DuplicateEvent { .. }) => info!(
            handler = handler.name(),
            topic = envelope.topic(),
            message_id = %envelope.message_id(),
            reason = %err,
            "duplicate delivery acknowledged without re-applying"
        ),
        Err(err) if disposition == Disposition::Requeue => warn!(
            handler = handler.name(),
            topic = envelope.topic(),
            message_id = %envelope.message_id(),
            error = %err,
            "transient failure, leaving for redelivery"
        ),
        Err(err) => error!(
            handler = handler.name(),
            topic = envelope.topic(),
            message_id = %envelope.message_id(),
            error = %err,
            "permanent failure, dropping envelope"
        ),
    }

    disposition
}

/// Bounded retry policy for a publish the caller cannot leave to redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishRetry {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay between attempts.
    pub backoff: Backoff,
}

impl Default for PublishRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(1),
            },
        }
    }
}

/// Publishes `envelope`, retrying failures per `retry`. Every attempt sends
/// the same envelope, so consumers see one `message_id` however many attempts
/// reach the broker.
///
/// # Errors
///
/// Returns the last `MessagingError` once every attempt has failed.
pub async fn publish_with_retry(
    publisher: &dyn Publisher,
    envelope: &Envelope,
    retry: PublishRetry,
) -> Result<(), MessagingError> {
    let mut delay = retry.backoff.initial;
    let mut attempt = 1;
    loop {
        match publisher.publish(envelope).await {
            Ok(()) => return Ok(()),
            Err(err) if attempt >= retry.attempts => return Err(err),
            Err(err) => {
                warn!(
                    topic = envelope.topic(),
                    message_id = %envelope.message_id(),
                    attempt,
                    error = %err,
                    "publish failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = retry.backoff.next(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use uuid::Uuid;

    /// Fails the first `failures` publishes.
    struct FlakyPublisher {
        failures: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for FlakyPublisher {
        async fn publish(&self, _envelope: &Envelope) -> Result<(), MessagingError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(MessagingError::Publish("broker unavailable".into()));
            }
            Ok(())
        }
    }

    fn fast_retry(attempts: u32) -> PublishRetry {
        PublishRetry {
            attempts,
            backoff: Backoff {
                initial: Duration::from_millis(1),
                max: Duration::from_millis(2),
            },
        }
    }

    fn envelope() -> Envelope {
        Envelope::new(
            crate::topics::TRIP_CREATED,
            "u1",
            &serde_json::json!({"trip_id": Uuid::new_v4()}),
            Uuid::new_v4(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_retry_recovers_from_transient_failure() {
        // Arrange
        let publisher = FlakyPublisher {
            failures: 2,
            attempts: AtomicUsize::new(0),
        };

        // Act
        let result = publish_with_retry(&publisher, &envelope(), fast_retry(3)).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_publish_retry_stops_after_last_attempt() {
        let publisher = FlakyPublisher {
            failures: usize::MAX,
            attempts: AtomicUsize::new(0),
        };

        let result = publish_with_retry(&publisher, &envelope(), fast_retry(3)).await;

        assert!(matches!(result, Err(MessagingError::Publish(_))));
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_success_and_duplicates_are_acked() {
        assert_eq!(Disposition::from_result(&Ok(())), Disposition::Ack);
        assert_eq!(
            Disposition::from_result(&Err(DomainError::duplicate(Uuid::new_v4(), "settled"))),
            Disposition::Ack
        );
    }

    #[test]
    fn test_dependency_failures_are_requeued() {
        assert_eq!(
            Disposition::from_result(&Err(DomainError::Dependency("store down".into()))),
            Disposition::Requeue
        );
        assert_eq!(
            Disposition::from_result(&Err(DomainError::out_of_order(Uuid::new_v4(), "early"))),
            Disposition::Requeue
        );
    }

    #[test]
    fn test_validation_failures_are_rejected() {
        assert_eq!(
            Disposition::from_result(&Err(DomainError::Validation("bad payload".into()))),
            Disposition::Reject
        );
        assert_eq!(
            Disposition::from_result(&Err(DomainError::AggregateNotFound(Uuid::new_v4()))),
            Disposition::Reject
        );
    }
}
