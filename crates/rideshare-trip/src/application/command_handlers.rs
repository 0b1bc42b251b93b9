//! Command handlers for the trip context.
//!
//! Each handler loads the trip stream, runs the aggregate transition, appends
//! the resulting events with optimistic concurrency and, for trip creation,
//! announces the trip on the broker.

use std::time::Duration;

use rideshare_core::aggregate::AggregateRoot;
use rideshare_core::clock::Clock;
use rideshare_core::error::DomainError;
use rideshare_core::repository::{EventRepository, StoredEvent};
use rideshare_messaging::bus::{PublishRetry, Publisher, publish_with_retry};
use rideshare_messaging::contracts::{FareContract, TripCreatedData};
use rideshare_messaging::envelope::Envelope;
use rideshare_messaging::supervisor::Backoff;
use rideshare_messaging::topics;
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::application::query_handlers::TripView;
use crate::domain::aggregates::Trip;
use crate::domain::commands::{
    AssignDriver, CancelTrip, CompensateMissingDriver, CreateTrip, PreviewTrip,
    RecordPaymentSession, SettlePayment,
};
use crate::domain::events::{TripEvent, TripEventKind};
use crate::domain::pricing::{CarPackage, FareEstimator, RideFare, Route, RoutePlanner};

/// Bounds on announcing a new trip before it is compensated.
pub const CREATE_PUBLISH_RETRY: PublishRetry = PublishRetry {
    attempts: 3,
    backoff: Backoff {
        initial: Duration::from_millis(100),
        max: Duration::from_secs(1),
    },
};

/// Cancellation reason recorded when `trip.created` cannot be published.
pub const BROKER_UNAVAILABLE_REASON: &str = "broker unavailable";

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct TripCommandResult {
    /// The trip after the command.
    pub trip: TripView,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// Route and per-package fares for a prospective trip.
#[derive(Debug, Clone, Serialize)]
pub struct TripPreview {
    /// The planned route.
    pub route: Route,
    /// One fare per ride package.
    pub ride_fares: Vec<RideFare>,
}

/// Reconstitutes a `Trip` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Dependency` if event deserialization fails.
pub(crate) fn reconstitute(
    trip_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<Trip, DomainError> {
    let mut trip = Trip::new(trip_id);
    for stored in existing_events {
        let kind: TripEventKind = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DomainError::Dependency(format!("event deserialization failed: {e}")))?;
        trip.apply(&TripEvent {
            metadata: stored.metadata(),
            kind,
        });
    }
    Ok(trip)
}

async fn load_existing(trip_id: Uuid, repo: &dyn EventRepository) -> Result<Trip, DomainError> {
    let existing_events = repo.load_events(trip_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(trip_id));
    }
    reconstitute(trip_id, &existing_events)
}

/// Appends uncommitted events at the loaded version, then folds them in.
async fn save(trip: &mut Trip, repo: &dyn EventRepository) -> Result<Vec<StoredEvent>, DomainError> {
    let pending = trip.uncommitted_events().to_vec();
    let stored_events: Vec<StoredEvent> = pending.iter().map(StoredEvent::from_domain).collect();

    repo.append_events(trip.id, trip.version(), &stored_events)
        .await?;

    for event in &pending {
        trip.apply(event);
    }
    trip.clear_uncommitted_events();
    Ok(stored_events)
}

async fn transition<F>(
    trip_id: Uuid,
    repo: &dyn EventRepository,
    change: F,
) -> Result<TripCommandResult, DomainError>
where
    F: FnOnce(&mut Trip) -> Result<(), DomainError>,
{
    let mut trip = load_existing(trip_id, repo).await?;
    change(&mut trip)?;
    let stored_events = save(&mut trip, repo).await?;
    Ok(TripCommandResult {
        trip: TripView::from(&trip),
        stored_events,
    })
}

fn fare_contract(fare: &RideFare) -> FareContract {
    FareContract {
        fare_id: fare.id,
        package_slug: fare.package_slug.clone(),
        total_price_in_cents: fare.total_price_in_cents,
        currency: fare.currency.clone(),
    }
}

/// Handles the `PreviewTrip` command: plans a route and prices every package.
/// Nothing is persisted or published.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank user or bad coordinates and
/// `DomainError::Dependency` if a pricing collaborator fails.
pub async fn handle_preview_trip(
    command: &PreviewTrip,
    planner: &dyn RoutePlanner,
    estimator: &dyn FareEstimator,
) -> Result<TripPreview, DomainError> {
    let mut draft = Trip::new(Uuid::nil());
    draft.preview(&command.user_id, command.pickup, command.destination)?;

    let route = planner.plan(&command.pickup, &command.destination).await?;
    let ride_fares = estimator.estimate(&route)?;
    debug!(
        status = %draft.status(),
        fares = ride_fares.len(),
        "trip previewed"
    );
    Ok(TripPreview { route, ride_fares })
}

/// Handles the `CreateTrip` command: prices the route, persists the trip in
/// `Started` and publishes `trip.created` owned by the rider.
///
/// The publish is retried per `retry` under a message ID derived from the
/// trip ID. If it never lands, the trip is cancelled before the error is
/// returned, so no `Started` trip is left without its announcement.
///
/// # Errors
///
/// Returns `DomainError::Validation` for bad input or an unknown package,
/// `DomainError::DuplicateEvent` if the trip ID is taken, and
/// `DomainError::Dependency` if pricing, persistence or the broker fails.
pub async fn handle_create_trip(
    command: &CreateTrip,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    publisher: &dyn Publisher,
    planner: &dyn RoutePlanner,
    estimator: &dyn FareEstimator,
) -> Result<TripCommandResult, DomainError> {
    let package: CarPackage = command.package_slug.parse()?;
    if command.user_id.trim().is_empty() {
        return Err(DomainError::Validation("user_id must not be empty".into()));
    }
    command.pickup.validate()?;
    command.destination.validate()?;

    let route = planner.plan(&command.pickup, &command.destination).await?;
    let fare = estimator
        .estimate(&route)?
        .into_iter()
        .find(|fare| fare.package_slug == package.slug())
        .ok_or_else(|| DomainError::Validation(format!("package {package} is not offered")))?;

    let data = TripCreatedData {
        trip_id: command.trip_id,
        user_id: command.user_id.clone(),
        pickup: command.pickup,
        destination: command.destination,
        fare: fare_contract(&fare),
    };
    let envelope = Envelope::new(
        topics::TRIP_CREATED,
        &command.user_id,
        &data,
        command.correlation_id,
    )
    .map_err(|e| DomainError::Validation(e.to_string()))?
    .with_message_id(Uuid::new_v5(
        &command.trip_id,
        topics::TRIP_CREATED.as_bytes(),
    ));

    let existing_events = repo.load_events(command.trip_id).await?;
    let mut trip = reconstitute(command.trip_id, &existing_events)?;
    trip.start(
        &command.user_id,
        command.pickup,
        command.destination,
        fare,
        command.correlation_id,
        clock,
    )?;
    let mut stored_events = save(&mut trip, repo).await?;

    if let Err(err) = publish_with_retry(publisher, &envelope, CREATE_PUBLISH_RETRY).await {
        error!(
            trip_id = %trip.id,
            message_id = %envelope.message_id(),
            error = %err,
            "trip.created could not be published, cancelling trip"
        );
        trip.cancel(
            BROKER_UNAVAILABLE_REASON,
            command.correlation_id,
            envelope.message_id(),
            clock,
        )?;
        match save(&mut trip, repo).await {
            Ok(cancelled) => stored_events.extend(cancelled),
            Err(save_err) => error!(
                trip_id = %trip.id,
                error = %save_err,
                "compensating cancellation could not be stored"
            ),
        }
        return Err(DomainError::Dependency(format!(
            "trip {} was not announced: {err}",
            trip.id
        )));
    }

    info!(
        trip_id = %trip.id,
        owner_id = %command.user_id,
        package = %package,
        message_id = %envelope.message_id(),
        "trip created"
    );

    Ok(TripCommandResult {
        trip: TripView::from(&trip),
        stored_events,
    })
}

/// Handles the `AssignDriver` command.
///
/// # Errors
///
/// Returns `DomainError` from loading, the transition or appending.
pub async fn handle_assign_driver(
    command: &AssignDriver,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<TripCommandResult, DomainError> {
    transition(command.trip_id, repo, |trip| {
        trip.assign_driver(
            command.driver.clone(),
            command.correlation_id,
            command.message_id,
            clock,
        )
    })
    .await
}

/// Handles the `RecordPaymentSession` command.
///
/// # Errors
///
/// Returns `DomainError` from loading, the transition or appending.
pub async fn handle_record_payment_session(
    command: &RecordPaymentSession,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<TripCommandResult, DomainError> {
    transition(command.trip_id, repo, |trip| {
        trip.record_payment_session(
            &command.session_id,
            command.correlation_id,
            command.message_id,
            clock,
        )
    })
    .await
}

/// Handles the `SettlePayment` command.
///
/// # Errors
///
/// Returns `DomainError` from loading, the transition or appending.
pub async fn handle_settle_payment(
    command: &SettlePayment,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<TripCommandResult, DomainError> {
    transition(command.trip_id, repo, |trip| {
        trip.settle_payment(
            command.outcome.clone(),
            command.correlation_id,
            command.message_id,
            clock,
        )
    })
    .await
}

/// Handles the `CancelTrip` command.
///
/// # Errors
///
/// Returns `DomainError::InvalidTransition` once payment has settled, plus
/// any error from loading or appending.
pub async fn handle_cancel_trip(
    command: &CancelTrip,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<TripCommandResult, DomainError> {
    let reason = if command.reason.trim().is_empty() {
        "cancelled by rider"
    } else {
        command.reason.as_str()
    };
    transition(command.trip_id, repo, |trip| {
        trip.cancel(reason, command.correlation_id, command.correlation_id, clock)
    })
    .await
}

/// Handles the `CompensateMissingDriver` command.
///
/// # Errors
///
/// Returns `DomainError::DuplicateEvent` if the trip is past matching, plus
/// any error from loading or appending.
pub async fn handle_compensate_missing_driver(
    command: &CompensateMissingDriver,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<TripCommandResult, DomainError> {
    transition(command.trip_id, repo, |trip| {
        trip.cancel_for_missing_driver(
            &command.package_slug,
            command.correlation_id,
            command.message_id,
            clock,
        )
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use async_trait::async_trait;
    use rideshare_core::geo::Coordinate;
    use rideshare_test_support::{
        FailingEventRepository, FailingPublisher, FixedClock, InMemoryEventRepository,
        RecordingPublisher,
    };

    use crate::domain::aggregates::{PaymentOutcome, TripStatus};
    use crate::domain::events::{
        AssignedDriver, TRIP_CANCELLED_EVENT_TYPE, TRIP_STARTED_EVENT_TYPE,
    };
    use crate::domain::pricing::{PackageFareEstimator, StraightLineRoutePlanner};

    fn create_command(user_id: &str, package_slug: &str) -> CreateTrip {
        CreateTrip {
            correlation_id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            user_id: user_id.into(),
            pickup: Coordinate::new(37.77, -122.41).unwrap(),
            destination: Coordinate::new(37.79, -122.40).unwrap(),
            package_slug: package_slug.into(),
        }
    }

    async fn create(repo: &InMemoryEventRepository, publisher: &RecordingPublisher) -> Uuid {
        let command = create_command("u1", "sedan");
        handle_create_trip(
            &command,
            &FixedClock::at_unix(1_700_000_000),
            repo,
            publisher,
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await
        .unwrap();
        command.trip_id
    }

    fn assign(trip_id: Uuid, message_id: Uuid) -> AssignDriver {
        AssignDriver {
            correlation_id: Uuid::new_v4(),
            message_id,
            trip_id,
            driver: AssignedDriver {
                driver_id: "D1".into(),
                name: "Dee".into(),
                car_plate: "7ABC123".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_create_trip_persists_started_trip_and_publishes_once() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let publisher = RecordingPublisher::new();
        let command = create_command("u1", "suv");

        // Act
        let result = handle_create_trip(
            &command,
            &FixedClock::at_unix(1_700_000_000),
            &repo,
            &publisher,
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(result.trip.status, TripStatus::Started);
        assert_eq!(result.stored_events.len(), 1);
        assert_eq!(result.stored_events[0].event_type, TRIP_STARTED_EVENT_TYPE);
        assert_eq!(repo.events_for(command.trip_id).len(), 1);

        let published = publisher.published_on(topics::TRIP_CREATED);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].owner_id(), "u1");
        assert_eq!(published[0].correlation_id(), command.correlation_id);
        let data: TripCreatedData = published[0].decode().unwrap();
        assert_eq!(data.trip_id, command.trip_id);
        assert_eq!(data.fare.package_slug, "suv");
    }

    #[tokio::test]
    async fn test_create_trip_rejects_blank_user_without_side_effects() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let publisher = RecordingPublisher::new();

        // Act
        let result = handle_create_trip(
            &create_command("", "sedan"),
            &FixedClock::at_unix(0),
            &repo,
            &publisher,
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(repo.stream_count(), 0);
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_create_trip_rejects_unknown_package() {
        let result = handle_create_trip(
            &create_command("u1", "rickshaw"),
            &FixedClock::at_unix(0),
            &InMemoryEventRepository::new(),
            &RecordingPublisher::new(),
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_trip_with_store_down_is_dependency_error() {
        let result = handle_create_trip(
            &create_command("u1", "sedan"),
            &FixedClock::at_unix(0),
            &FailingEventRepository,
            &RecordingPublisher::new(),
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await;

        assert!(matches!(result, Err(DomainError::Dependency(_))));
    }

    #[tokio::test]
    async fn test_create_trip_with_broker_down_cancels_the_stored_trip() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let publisher = FailingPublisher::always();
        let command = create_command("u1", "sedan");

        // Act
        let result = handle_create_trip(
            &command,
            &FixedClock::at_unix(0),
            &repo,
            &publisher,
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Dependency(_))));
        assert_eq!(
            publisher.attempts(),
            usize::try_from(CREATE_PUBLISH_RETRY.attempts).unwrap()
        );
        assert!(publisher.published().is_empty());

        let events = repo.events_for(command.trip_id);
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, [TRIP_STARTED_EVENT_TYPE, TRIP_CANCELLED_EVENT_TYPE]);
        let trip = reconstitute(command.trip_id, &events).unwrap();
        assert_eq!(trip.status(), TripStatus::Cancelled);
        assert_eq!(trip.cancel_reason.as_deref(), Some(BROKER_UNAVAILABLE_REASON));
    }

    #[tokio::test]
    async fn test_create_trip_survives_a_transient_broker_failure() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let publisher = FailingPublisher::failing_times(1);
        let command = create_command("u1", "sedan");

        // Act
        let result = handle_create_trip(
            &command,
            &FixedClock::at_unix(0),
            &repo,
            &publisher,
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(result.trip.status, TripStatus::Started);
        assert_eq!(publisher.attempts(), 2);
        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(
            published[0].message_id(),
            Uuid::new_v5(&command.trip_id, topics::TRIP_CREATED.as_bytes())
        );
        assert_eq!(repo.events_for(command.trip_id).len(), 1);
    }

    /// Counts route requests without validating them.
    #[derive(Default)]
    struct CountingPlanner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RoutePlanner for CountingPlanner {
        async fn plan(
            &self,
            pickup: &Coordinate,
            destination: &Coordinate,
        ) -> Result<Route, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Route {
                distance_meters: 1_000.0,
                duration_seconds: 120.0,
                geometry: vec![*pickup, *destination],
            })
        }
    }

    #[tokio::test]
    async fn test_preview_rejects_out_of_range_coordinates_before_planning() {
        // Arrange
        let planner = CountingPlanner::default();
        let command = PreviewTrip {
            correlation_id: Uuid::new_v4(),
            user_id: "u1".into(),
            pickup: Coordinate {
                latitude: 120.0,
                longitude: -122.41,
            },
            destination: Coordinate::new(37.79, -122.40).unwrap(),
        };

        // Act
        let result =
            handle_preview_trip(&command, &planner, &PackageFareEstimator::default()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(planner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_coordinates_before_planning() {
        // Arrange
        let planner = CountingPlanner::default();
        let repo = InMemoryEventRepository::new();
        let mut command = create_command("u1", "sedan");
        command.destination = Coordinate {
            latitude: 0.0,
            longitude: 200.0,
        };

        // Act
        let result = handle_create_trip(
            &command,
            &FixedClock::at_unix(0),
            &repo,
            &RecordingPublisher::new(),
            &planner,
            &PackageFareEstimator::default(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(planner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(repo.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_preview_returns_fares_without_persisting() {
        // Arrange
        let command = PreviewTrip {
            correlation_id: Uuid::new_v4(),
            user_id: "u1".into(),
            pickup: Coordinate::new(37.77, -122.41).unwrap(),
            destination: Coordinate::new(37.79, -122.40).unwrap(),
        };

        // Act
        let preview = handle_preview_trip(
            &command,
            &StraightLineRoutePlanner::default(),
            &PackageFareEstimator::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(preview.ride_fares.len(), CarPackage::ALL.len());
        assert_eq!(preview.route.geometry.len(), 2);
    }

    #[tokio::test]
    async fn test_assign_driver_on_unknown_trip_is_not_found() {
        let result = handle_assign_driver(
            &assign(Uuid::new_v4(), Uuid::new_v4()),
            &FixedClock::at_unix(0),
            &InMemoryEventRepository::new(),
        )
        .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    #[tokio::test]
    async fn test_full_lifecycle_appends_one_event_per_transition() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let publisher = RecordingPublisher::new();
        let clock = FixedClock::at_unix(1_700_000_000);
        let trip_id = create(&repo, &publisher).await;

        // Act
        handle_assign_driver(&assign(trip_id, Uuid::new_v4()), &clock, &repo)
            .await
            .unwrap();
        handle_record_payment_session(
            &RecordPaymentSession {
                correlation_id: Uuid::new_v4(),
                message_id: Uuid::new_v4(),
                trip_id,
                session_id: "cs_1".into(),
            },
            &clock,
            &repo,
        )
        .await
        .unwrap();
        let settled = handle_settle_payment(
            &SettlePayment {
                correlation_id: Uuid::new_v4(),
                message_id: Uuid::new_v4(),
                trip_id,
                outcome: PaymentOutcome::Succeeded {
                    session_id: Some("cs_1".into()),
                },
            },
            &clock,
            &repo,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(settled.trip.status, TripStatus::PaymentSucceeded);
        assert_eq!(settled.trip.version, 4);
        let sequence: Vec<i64> = repo
            .events_for(trip_id)
            .iter()
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(sequence, [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_redelivered_assignment_appends_nothing() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let trip_id = create(&repo, &RecordingPublisher::new()).await;
        let clock = FixedClock::at_unix(0);
        let command = assign(trip_id, Uuid::new_v4());
        handle_assign_driver(&command, &clock, &repo).await.unwrap();

        // Act
        let again = handle_assign_driver(&command, &clock, &repo).await;

        // Assert
        assert!(matches!(again, Err(DomainError::DuplicateEvent { .. })));
        assert_eq!(repo.events_for(trip_id).len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_after_settlement_is_invalid_transition() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let trip_id = create(&repo, &RecordingPublisher::new()).await;
        let clock = FixedClock::at_unix(0);
        handle_assign_driver(&assign(trip_id, Uuid::new_v4()), &clock, &repo)
            .await
            .unwrap();
        handle_settle_payment(
            &SettlePayment {
                correlation_id: Uuid::new_v4(),
                message_id: Uuid::new_v4(),
                trip_id,
                outcome: PaymentOutcome::Failed {
                    reason: "checkout.session.expired".into(),
                },
            },
            &clock,
            &repo,
        )
        .await
        .unwrap();

        // Act
        let result = handle_cancel_trip(
            &CancelTrip {
                correlation_id: Uuid::new_v4(),
                trip_id,
                reason: String::new(),
            },
            &clock,
            &repo,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_missing_driver_cancels_started_trip() {
        // Arrange
        let repo = InMemoryEventRepository::new();
        let trip_id = create(&repo, &RecordingPublisher::new()).await;

        // Act
        let result = handle_compensate_missing_driver(
            &CompensateMissingDriver {
                correlation_id: Uuid::new_v4(),
                message_id: Uuid::new_v4(),
                trip_id,
                package_slug: "sedan".into(),
            },
            &FixedClock::at_unix(0),
            &repo,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(result.trip.status, TripStatus::Cancelled);
        assert!(result.trip.cancel_reason.unwrap().contains("sedan"));
    }
}
