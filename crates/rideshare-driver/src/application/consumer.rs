//! Matches every new trip to a driver.

use std::sync::Arc;

use async_trait::async_trait;
use rideshare_core::error::DomainError;
use rideshare_messaging::bus::{EventHandler, Publisher};
use rideshare_messaging::contracts::{
    DriverAssignedData, DriverContract, DriverNotFoundData, TripCreatedData,
};
use rideshare_messaging::envelope::Envelope;
use rideshare_messaging::topics;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::registry::DriverRegistry;

/// Consumes `trip.created` and answers with `driver.assigned` or
/// `driver.not_found`, owned by the rider.
///
/// The answer's message ID is derived from the trip and topic, so a
/// redelivered `trip.created` produces an envelope the trip service already
/// recognizes.
pub struct DriverMatchingConsumer {
    registry: Arc<DriverRegistry>,
    publisher: Arc<dyn Publisher>,
}

impl DriverMatchingConsumer {
    /// Creates a consumer over `registry`, answering through `publisher`.
    #[must_use]
    pub fn new(registry: Arc<DriverRegistry>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            registry,
            publisher,
        }
    }

    async fn answer<T: serde::Serialize + Sync>(
        &self,
        topic: &str,
        trip: &TripCreatedData,
        payload: &T,
        correlation_id: Uuid,
    ) -> Result<(), DomainError> {
        let envelope = Envelope::new(topic, &trip.user_id, payload, correlation_id)
            .map_err(|e| DomainError::Validation(e.to_string()))?
            .with_message_id(Uuid::new_v5(&trip.trip_id, topic.as_bytes()));
        self.publisher
            .publish(&envelope)
            .await
            .map_err(|e| DomainError::Dependency(e.to_string()))
    }
}

#[async_trait]
impl EventHandler for DriverMatchingConsumer {
    fn name(&self) -> &'static str {
        "driver-matching"
    }

    async fn handle(&self, envelope: &Envelope) -> Result<(), DomainError> {
        if envelope.topic() != topics::TRIP_CREATED {
            debug!(topic = envelope.topic(), "not a trip creation, ignoring");
            return Ok(());
        }
        let trip: TripCreatedData = envelope
            .decode()
            .map_err(|e| DomainError::Validation(e.to_string()))?;
        let package_slug = trip.fare.package_slug.clone();

        match self.registry.match_driver(trip.trip_id, &package_slug) {
            Some(driver) => {
                info!(
                    trip_id = %trip.trip_id,
                    driver_id = %driver.id,
                    package = %package_slug,
                    "driver matched"
                );
                let data = DriverAssignedData {
                    trip_id: trip.trip_id,
                    user_id: trip.user_id.clone(),
                    driver: DriverContract {
                        driver_id: driver.id,
                        name: driver.name,
                        car_plate: driver.car_plate,
                        package_slug: driver.package_slug,
                    },
                    fare: trip.fare.clone(),
                };
                self.answer(
                    topics::DRIVER_ASSIGNED,
                    &trip,
                    &data,
                    envelope.correlation_id(),
                )
                .await
            }
            None => {
                warn!(
                    trip_id = %trip.trip_id,
                    package = %package_slug,
                    "no driver available"
                );
                let data = DriverNotFoundData {
                    trip_id: trip.trip_id,
                    user_id: trip.user_id.clone(),
                    package_slug,
                };
                self.answer(
                    topics::DRIVER_NOT_FOUND,
                    &trip,
                    &data,
                    envelope.correlation_id(),
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rideshare_core::geo::Coordinate;
    use rideshare_messaging::bus::{Disposition, dispatch};
    use rideshare_messaging::contracts::FareContract;
    use rideshare_test_support::{FailingPublisher, MockRng, RecordingPublisher};

    use crate::domain::registry::Driver;

    fn registry() -> Arc<DriverRegistry> {
        let registry = DriverRegistry::new(Arc::new(Mutex::new(MockRng)));
        registry
            .register(Driver {
                id: "D1".into(),
                name: "Dee".into(),
                car_plate: "7ABC123".into(),
                package_slug: "sedan".into(),
            })
            .unwrap();
        Arc::new(registry)
    }

    fn trip_created(package_slug: &str) -> Envelope {
        Envelope::new(
            topics::TRIP_CREATED,
            "u1",
            &TripCreatedData {
                trip_id: Uuid::new_v4(),
                user_id: "u1".into(),
                pickup: Coordinate::new(37.77, -122.41).unwrap(),
                destination: Coordinate::new(37.78, -122.42).unwrap(),
                fare: FareContract {
                    fare_id: Uuid::new_v4(),
                    package_slug: package_slug.into(),
                    total_price_in_cents: 1500,
                    currency: "usd".into(),
                },
            },
            Uuid::new_v4(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_trip_created_publishes_driver_assigned_owned_by_rider() {
        // Arrange
        let publisher = Arc::new(RecordingPublisher::new());
        let consumer = DriverMatchingConsumer::new(registry(), publisher.clone());
        let envelope = trip_created("sedan");

        // Act
        let disposition = dispatch(&consumer, &envelope).await;

        // Assert
        assert_eq!(disposition, Disposition::Ack);
        let published = publisher.published_on(topics::DRIVER_ASSIGNED);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].owner_id(), "u1");
        assert_eq!(published[0].correlation_id(), envelope.correlation_id());
        let data: DriverAssignedData = published[0].decode().unwrap();
        assert_eq!(data.driver.driver_id, "D1");
        assert_eq!(data.fare.total_price_in_cents, 1500);
    }

    #[tokio::test]
    async fn test_redelivery_reannounces_same_driver_with_same_message_id() {
        // Arrange
        let publisher = Arc::new(RecordingPublisher::new());
        let consumer = DriverMatchingConsumer::new(registry(), publisher.clone());
        let envelope = trip_created("sedan");

        // Act
        dispatch(&consumer, &envelope).await;
        dispatch(&consumer, &envelope).await;

        // Assert
        let published = publisher.published_on(topics::DRIVER_ASSIGNED);
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].message_id(), published[1].message_id());
        assert_eq!(published[0].payload(), published[1].payload());
    }

    #[tokio::test]
    async fn test_unserved_package_publishes_driver_not_found() {
        // Arrange
        let publisher = Arc::new(RecordingPublisher::new());
        let consumer = DriverMatchingConsumer::new(registry(), publisher.clone());

        // Act
        let disposition = dispatch(&consumer, &trip_created("luxury")).await;

        // Assert
        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(publisher.topics(), [topics::DRIVER_NOT_FOUND]);
        let data: DriverNotFoundData = publisher.published()[0].decode().unwrap();
        assert_eq!(data.package_slug, "luxury");
    }

    #[tokio::test]
    async fn test_publish_failure_is_requeued() {
        let consumer = DriverMatchingConsumer::new(registry(), Arc::new(FailingPublisher::always()));

        let disposition = dispatch(&consumer, &trip_created("sedan")).await;

        assert_eq!(disposition, Disposition::Requeue);
    }
}
