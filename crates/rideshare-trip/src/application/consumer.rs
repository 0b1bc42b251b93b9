//! Broker consumer that advances trips from driver and payment events.
//!
//! Every delivery for a trip runs under that trip's lock, so two envelopes for
//! the same trip never interleave their load-check-append sections. Optimistic
//! concurrency on append still guards against other processes.

use std::sync::Arc;

use async_trait::async_trait;
use rideshare_core::clock::Clock;
use rideshare_core::error::DomainError;
use rideshare_core::lock::KeyedLocks;
use rideshare_core::repository::EventRepository;
use rideshare_messaging::bus::EventHandler;
use rideshare_messaging::contracts::{
    DriverAssignedData, DriverNotFoundData, PaymentFailedData, PaymentSessionCreatedData,
    PaymentStatusUpdateData,
};
use rideshare_messaging::envelope::Envelope;
use rideshare_messaging::topics;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::command_handlers::{
    TripCommandResult, handle_assign_driver, handle_compensate_missing_driver,
    handle_record_payment_session, handle_settle_payment,
};
use crate::application::query_handlers::{TripView, get_trip_by_id};
use crate::domain::aggregates::PaymentOutcome;
use crate::domain::commands::{
    AssignDriver, CompensateMissingDriver, RecordPaymentSession, SettlePayment,
};
use crate::domain::events::AssignedDriver;
use crate::state::AppState;

/// Applies `driver.*` and `payment.*` envelopes to the trip state machine.
#[derive(Clone)]
pub struct TripEventConsumer {
    clock: Arc<dyn Clock + Send + Sync>,
    event_repository: Arc<dyn EventRepository>,
    locks: Arc<KeyedLocks>,
}

impl TripEventConsumer {
    /// Creates a consumer sharing the service's store handle and trip locks.
    #[must_use]
    pub fn new(state: &AppState) -> Self {
        Self {
            clock: Arc::clone(&state.clock),
            event_repository: Arc::clone(&state.event_repository),
            locks: Arc::clone(&state.locks),
        }
    }
}

fn decode<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, DomainError> {
    envelope
        .decode()
        .map_err(|e| DomainError::Validation(e.to_string()))
}

fn applied(result: &TripCommandResult, topic: &str) {
    info!(
        trip_id = %result.trip.trip_id,
        status = %result.trip.status,
        topic,
        "trip advanced"
    );
}

impl TripEventConsumer {
    async fn locked<F, Fut>(&self, trip_id: Uuid, topic: &str, run: F) -> Result<(), DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<TripCommandResult, DomainError>>,
    {
        let _guard = self.locks.lock(trip_id).await;
        let result = run().await?;
        applied(&result, topic);
        Ok(())
    }

    /// Current view of a trip, read under its lock.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for unknown trips.
    pub async fn snapshot(&self, trip_id: Uuid) -> Result<TripView, DomainError> {
        let _guard = self.locks.lock(trip_id).await;
        get_trip_by_id(trip_id, self.event_repository.as_ref()).await
    }
}

#[async_trait]
impl EventHandler for TripEventConsumer {
    fn name(&self) -> &'static str {
        "trip-state-machine"
    }

    async fn handle(&self, envelope: &Envelope) -> Result<(), DomainError> {
        let clock = self.clock.as_ref();
        let repo = self.event_repository.as_ref();
        let topic = envelope.topic();
        let correlation_id = envelope.correlation_id();
        let message_id = envelope.message_id();

        match topic {
            topics::DRIVER_ASSIGNED => {
                let data: DriverAssignedData = decode(envelope)?;
                let command = AssignDriver {
                    correlation_id,
                    message_id,
                    trip_id: data.trip_id,
                    driver: AssignedDriver {
                        driver_id: data.driver.driver_id,
                        name: data.driver.name,
                        car_plate: data.driver.car_plate,
                    },
                };
                self.locked(command.trip_id, topic, || {
                    handle_assign_driver(&command, clock, repo)
                })
                .await
            }
            topics::DRIVER_NOT_FOUND => {
                let data: DriverNotFoundData = decode(envelope)?;
                let command = CompensateMissingDriver {
                    correlation_id,
                    message_id,
                    trip_id: data.trip_id,
                    package_slug: data.package_slug,
                };
                self.locked(command.trip_id, topic, || {
                    handle_compensate_missing_driver(&command, clock, repo)
                })
                .await
            }
            topics::PAYMENT_SESSION_CREATED => {
                let data: PaymentSessionCreatedData = decode(envelope)?;
                let command = RecordPaymentSession {
                    correlation_id,
                    message_id,
                    trip_id: data.trip_id,
                    session_id: data.session_id,
                };
                self.locked(command.trip_id, topic, || {
                    handle_record_payment_session(&command, clock, repo)
                })
                .await
            }
            topics::PAYMENT_SUCCESS => {
                let data: PaymentStatusUpdateData = decode(envelope)?;
                let command = SettlePayment {
                    correlation_id,
                    message_id,
                    trip_id: data.trip_id,
                    outcome: PaymentOutcome::Succeeded {
                        session_id: data.session_id,
                    },
                };
                self.locked(command.trip_id, topic, || {
                    handle_settle_payment(&command, clock, repo)
                })
                .await
            }
            topics::PAYMENT_FAILED => {
                let data: PaymentFailedData = decode(envelope)?;
                let command = SettlePayment {
                    correlation_id,
                    message_id,
                    trip_id: data.trip_id,
                    outcome: PaymentOutcome::Failed {
                        reason: data.reason,
                    },
                };
                self.locked(command.trip_id, topic, || {
                    handle_settle_payment(&command, clock, repo)
                })
                .await
            }
            other => {
                debug!(topic = other, "no trip transition for topic");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_messaging::bus::{Disposition, dispatch};
    use rideshare_messaging::contracts::{DriverContract, FareContract};
    use rideshare_core::geo::Coordinate;
    use rideshare_test_support::{FixedClock, InMemoryEventRepository, RecordingPublisher};

    use crate::application::command_handlers::handle_create_trip;
    use crate::domain::aggregates::TripStatus;
    use crate::domain::commands::CreateTrip;
    use crate::domain::pricing::{PackageFareEstimator, StraightLineRoutePlanner};

    struct Harness {
        consumer: TripEventConsumer,
        repo: Arc<InMemoryEventRepository>,
        trip_id: Uuid,
    }

    async fn harness() -> Harness {
        let repo = Arc::new(InMemoryEventRepository::new());
        let state = AppState::new(
            Arc::new(FixedClock::at_unix(1_700_000_000)),
            repo.clone(),
            Arc::new(RecordingPublisher::new()),
        );
        let trip_id = Uuid::new_v4();
        handle_create_trip(
            &CreateTrip {
                correlation_id: Uuid::new_v4(),
                trip_id,
                user_id: "u1".into(),
                pickup: Coordinate::new(37.77, -122.41).unwrap(),
                destination: Coordinate::new(37.79, -122.40).unwrap(),
                package_slug: "sedan".into(),
            },
            state.clock.as_ref(),
            state.event_repository.as_ref(),
            state.publisher.as_ref(),
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await
        .unwrap();
        Harness {
            consumer: TripEventConsumer::new(&state),
            repo,
            trip_id,
        }
    }

    fn fare() -> FareContract {
        FareContract {
            fare_id: Uuid::new_v4(),
            package_slug: "sedan".into(),
            total_price_in_cents: 1200,
            currency: "usd".into(),
        }
    }

    fn driver_assigned(trip_id: Uuid) -> Envelope {
        Envelope::new(
            topics::DRIVER_ASSIGNED,
            "u1",
            &DriverAssignedData {
                trip_id,
                user_id: "u1".into(),
                driver: DriverContract {
                    driver_id: "D1".into(),
                    name: "Dee".into(),
                    car_plate: "7ABC123".into(),
                    package_slug: "sedan".into(),
                },
                fare: fare(),
            },
            Uuid::new_v4(),
        )
        .unwrap()
    }

    fn payment_success(trip_id: Uuid) -> Envelope {
        Envelope::new(
            topics::PAYMENT_SUCCESS,
            "u1",
            &PaymentStatusUpdateData {
                trip_id,
                user_id: "u1".into(),
                driver_id: "D1".into(),
                session_id: None,
            },
            Uuid::new_v4(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_driver_assigned_moves_trip_and_is_acked() {
        // Arrange
        let h = harness().await;

        // Act
        let disposition = dispatch(&h.consumer, &driver_assigned(h.trip_id)).await;

        // Assert
        assert_eq!(disposition, Disposition::Ack);
        let view = h.consumer.snapshot(h.trip_id).await.unwrap();
        assert_eq!(view.status, TripStatus::DriverAssigned);
    }

    #[tokio::test]
    async fn test_redelivered_envelope_is_acked_without_new_event() {
        // Arrange
        let h = harness().await;
        let envelope = driver_assigned(h.trip_id);
        dispatch(&h.consumer, &envelope).await;

        // Act
        let disposition = dispatch(&h.consumer, &envelope).await;

        // Assert
        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(h.repo.events_for(h.trip_id).len(), 2);
    }

    #[tokio::test]
    async fn test_payment_before_driver_is_requeued() {
        // Arrange
        let h = harness().await;

        // Act
        let disposition = dispatch(&h.consumer, &payment_success(h.trip_id)).await;

        // Assert
        assert_eq!(disposition, Disposition::Requeue);
        let view = h.consumer.snapshot(h.trip_id).await.unwrap();
        assert_eq!(view.status, TripStatus::Started);
    }

    #[tokio::test]
    async fn test_payment_after_driver_settles_trip() {
        // Arrange
        let h = harness().await;
        dispatch(&h.consumer, &driver_assigned(h.trip_id)).await;

        // Act
        let disposition = dispatch(&h.consumer, &payment_success(h.trip_id)).await;

        // Assert
        assert_eq!(disposition, Disposition::Ack);
        let view = h.consumer.snapshot(h.trip_id).await.unwrap();
        assert_eq!(view.status, TripStatus::PaymentSucceeded);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_rejected() {
        // Arrange
        let h = harness().await;
        let envelope = Envelope::new(
            topics::DRIVER_ASSIGNED,
            "u1",
            &serde_json::json!({"trip_id": "not-a-uuid"}),
            Uuid::new_v4(),
        )
        .unwrap();

        // Act
        let disposition = dispatch(&h.consumer, &envelope).await;

        // Assert
        assert_eq!(disposition, Disposition::Reject);
    }

    #[tokio::test]
    async fn test_event_for_unknown_trip_is_rejected() {
        let h = harness().await;

        let disposition = dispatch(&h.consumer, &driver_assigned(Uuid::new_v4())).await;

        assert_eq!(disposition, Disposition::Reject);
    }

    #[tokio::test]
    async fn test_driver_not_found_cancels_started_trip() {
        // Arrange
        let h = harness().await;
        let envelope = Envelope::new(
            topics::DRIVER_NOT_FOUND,
            "u1",
            &DriverNotFoundData {
                trip_id: h.trip_id,
                user_id: "u1".into(),
                package_slug: "sedan".into(),
            },
            Uuid::new_v4(),
        )
        .unwrap();

        // Act
        let disposition = dispatch(&h.consumer, &envelope).await;

        // Assert
        assert_eq!(disposition, Disposition::Ack);
        let view = h.consumer.snapshot(h.trip_id).await.unwrap();
        assert_eq!(view.status, TripStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_for_one_trip_apply_once() {
        // Arrange
        let h = harness().await;
        let first = driver_assigned(h.trip_id);
        let second = driver_assigned(h.trip_id);

        // Act
        let (a, b) = tokio::join!(
            dispatch(&h.consumer, &first),
            dispatch(&h.consumer, &second)
        );

        // Assert
        assert_eq!(a, Disposition::Ack);
        assert_eq!(b, Disposition::Ack);
        assert_eq!(h.repo.events_for(h.trip_id).len(), 2);
    }
}
