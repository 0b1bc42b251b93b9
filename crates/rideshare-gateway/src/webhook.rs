//! Provider webhook events and their translation into settlement envelopes.

use std::collections::HashMap;

pub use rideshare_messaging::bus::{PublishRetry, publish_with_retry};
use rideshare_messaging::contracts::{PaymentFailedData, PaymentStatusUpdateData};
use rideshare_messaging::envelope::Envelope;
use rideshare_messaging::topics;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::WebhookError;

/// Checkout paid synchronously.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Delayed payment method cleared.
pub const CHECKOUT_ASYNC_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
/// Delayed payment method failed.
pub const CHECKOUT_ASYNC_FAILED: &str = "checkout.session.async_payment_failed";
/// Checkout abandoned until it expired.
pub const CHECKOUT_EXPIRED: &str = "checkout.session.expired";

/// How a provider event settles a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Publish `payment.success`.
    Succeeded,
    /// Publish `payment.failed`.
    Failed,
}

/// A provider event. Only the fields settlement needs are read.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEvent {
    /// Provider event ID; stable across provider retries.
    pub id: String,
    /// Event type, e.g. `checkout.session.completed`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event body.
    pub data: ProviderEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEventData {
    /// The checkout session the event is about.
    pub object: CheckoutSessionObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    /// Provider session ID.
    pub id: String,
    /// Metadata attached when the session was opened.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderEvent {
    /// Parses a verified raw body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Payload` if the body is not a provider event.
    pub fn parse(raw: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(raw).map_err(|e| WebhookError::Payload(e.to_string()))
    }

    /// The settlement this event represents, if any.
    #[must_use]
    pub fn settlement(&self) -> Option<SettlementOutcome> {
        match self.event_type.as_str() {
            CHECKOUT_COMPLETED | CHECKOUT_ASYNC_SUCCEEDED => Some(SettlementOutcome::Succeeded),
            CHECKOUT_EXPIRED | CHECKOUT_ASYNC_FAILED => Some(SettlementOutcome::Failed),
            _ => None,
        }
    }

    /// Idempotency key for the settlement envelope. Provider retries of the
    /// same event map to the same key.
    #[must_use]
    pub fn message_id(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.id.as_bytes())
    }

    fn metadata(&self, key: &str) -> Result<&str, WebhookError> {
        self.data
            .object
            .metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WebhookError::Payload(format!("session metadata lacks {key}")))
    }

    /// Builds the settlement envelope, owned by the rider from the session
    /// metadata.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Payload` if the metadata lacks the trip, rider
    /// or driver, or the trip ID is not a UUID.
    pub fn settlement_envelope(
        &self,
        outcome: SettlementOutcome,
    ) -> Result<Envelope, WebhookError> {
        let trip_id = self.metadata("trip_id")?;
        let trip_id = Uuid::parse_str(trip_id)
            .map_err(|e| WebhookError::Payload(format!("trip_id {trip_id:?}: {e}")))?;
        let user_id = self.metadata("user_id")?.to_owned();
        let driver_id = self.metadata("driver_id")?.to_owned();
        let session_id = Some(self.data.object.id.clone());
        let correlation_id = Uuid::new_v4();

        let envelope = match outcome {
            SettlementOutcome::Succeeded => Envelope::new(
                topics::PAYMENT_SUCCESS,
                &user_id,
                &PaymentStatusUpdateData {
                    trip_id,
                    user_id: user_id.clone(),
                    driver_id,
                    session_id,
                },
                correlation_id,
            ),
            SettlementOutcome::Failed => Envelope::new(
                topics::PAYMENT_FAILED,
                &user_id,
                &PaymentFailedData {
                    trip_id,
                    user_id: user_id.clone(),
                    driver_id,
                    session_id,
                    reason: self.event_type.clone(),
                },
                correlation_id,
            ),
        }
        .map_err(|e| WebhookError::Payload(e.to_string()))?;

        Ok(envelope.with_message_id(self.message_id()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use rideshare_messaging::error::MessagingError;
    use rideshare_messaging::supervisor::Backoff;
    use rideshare_test_support::{FailingPublisher, RecordingPublisher};
    use serde_json::json;

    fn event(event_type: &str, metadata: &serde_json::Value) -> ProviderEvent {
        let raw = json!({
            "id": "evt_123",
            "type": event_type,
            "data": {"object": {"id": "cs_test_1", "metadata": metadata}}
        });
        ProviderEvent::parse(&serde_json::to_vec(&raw).unwrap()).unwrap()
    }

    fn full_metadata(trip_id: Uuid) -> serde_json::Value {
        json!({"trip_id": trip_id.to_string(), "user_id": "U1", "driver_id": "D1"})
    }

    fn fast_retry() -> PublishRetry {
        PublishRetry {
            attempts: 3,
            backoff: Backoff {
                initial: Duration::from_millis(1),
                max: Duration::from_millis(2),
            },
        }
    }

    #[test]
    fn test_event_types_map_to_outcomes() {
        let meta = json!({});
        assert_eq!(
            event(CHECKOUT_COMPLETED, &meta).settlement(),
            Some(SettlementOutcome::Succeeded)
        );
        assert_eq!(
            event(CHECKOUT_ASYNC_SUCCEEDED, &meta).settlement(),
            Some(SettlementOutcome::Succeeded)
        );
        assert_eq!(
            event(CHECKOUT_EXPIRED, &meta).settlement(),
            Some(SettlementOutcome::Failed)
        );
        assert_eq!(
            event(CHECKOUT_ASYNC_FAILED, &meta).settlement(),
            Some(SettlementOutcome::Failed)
        );
        assert_eq!(event("customer.created", &meta).settlement(), None);
    }

    #[test]
    fn test_completed_event_becomes_success_owned_by_rider() {
        // Arrange
        let trip_id = Uuid::new_v4();
        let event = event(CHECKOUT_COMPLETED, &full_metadata(trip_id));

        // Act
        let envelope = event
            .settlement_envelope(SettlementOutcome::Succeeded)
            .unwrap();

        // Assert
        assert_eq!(envelope.topic(), topics::PAYMENT_SUCCESS);
        assert_eq!(envelope.owner_id(), "U1");
        let data: PaymentStatusUpdateData = envelope.decode().unwrap();
        assert_eq!(data.trip_id, trip_id);
        assert_eq!(data.driver_id, "D1");
        assert_eq!(data.session_id.as_deref(), Some("cs_test_1"));
    }

    #[test]
    fn test_expired_event_carries_type_as_reason() {
        let event = event(CHECKOUT_EXPIRED, &full_metadata(Uuid::new_v4()));

        let envelope = event.settlement_envelope(SettlementOutcome::Failed).unwrap();

        assert_eq!(envelope.topic(), topics::PAYMENT_FAILED);
        let data: PaymentFailedData = envelope.decode().unwrap();
        assert_eq!(data.reason, CHECKOUT_EXPIRED);
    }

    #[test]
    fn test_same_provider_event_gives_same_message_id() {
        // Arrange
        let trip_id = Uuid::new_v4();
        let first = event(CHECKOUT_COMPLETED, &full_metadata(trip_id));
        let retried = event(CHECKOUT_COMPLETED, &full_metadata(trip_id));

        // Act
        let a = first.settlement_envelope(SettlementOutcome::Succeeded).unwrap();
        let b = retried.settlement_envelope(SettlementOutcome::Succeeded).unwrap();

        // Assert
        assert_eq!(a.message_id(), b.message_id());
    }

    #[test]
    fn test_missing_user_id_is_payload_error() {
        let event = event(
            CHECKOUT_COMPLETED,
            &json!({"trip_id": Uuid::new_v4().to_string(), "driver_id": "D1"}),
        );

        let result = event.settlement_envelope(SettlementOutcome::Succeeded);

        assert!(matches!(result, Err(WebhookError::Payload(m)) if m.contains("user_id")));
    }

    #[test]
    fn test_non_uuid_trip_id_is_payload_error() {
        let event = event(
            CHECKOUT_COMPLETED,
            &json!({"trip_id": "T1", "user_id": "U1", "driver_id": "D1"}),
        );

        assert!(matches!(
            event.settlement_envelope(SettlementOutcome::Succeeded),
            Err(WebhookError::Payload(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_succeeds_after_transient_failures() {
        // Arrange
        let publisher = FailingPublisher::failing_times(2);
        let envelope = event(CHECKOUT_COMPLETED, &full_metadata(Uuid::new_v4()))
            .settlement_envelope(SettlementOutcome::Succeeded)
            .unwrap();

        // Act
        let result = publish_with_retry(&publisher, &envelope, fast_retry()).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(publisher.attempts(), 3);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_gives_up_after_attempts_exhausted() {
        let publisher = FailingPublisher::always();
        let envelope = event(CHECKOUT_COMPLETED, &full_metadata(Uuid::new_v4()))
            .settlement_envelope(SettlementOutcome::Succeeded)
            .unwrap();

        let result = publish_with_retry(&publisher, &envelope, fast_retry()).await;

        assert!(matches!(result, Err(MessagingError::Publish(_))));
        assert_eq!(publisher.attempts(), 3);
    }

    #[tokio::test]
    async fn test_first_try_success_publishes_once() {
        let publisher = RecordingPublisher::new();
        let envelope = event(CHECKOUT_COMPLETED, &full_metadata(Uuid::new_v4()))
            .settlement_envelope(SettlementOutcome::Succeeded)
            .unwrap();

        publish_with_retry(&publisher, &envelope, fast_retry())
            .await
            .unwrap();

        assert_eq!(publisher.published().len(), 1);
    }
}
