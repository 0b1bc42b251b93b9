//! Commands for the trip context.

use rideshare_core::command::Command;
use rideshare_core::geo::Coordinate;
use uuid::Uuid;

use super::aggregates::PaymentOutcome;
use super::events::AssignedDriver;

/// Command to price a route without persisting anything.
#[derive(Debug, Clone)]
pub struct PreviewTrip {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// Pickup location.
    pub pickup: Coordinate,
    /// Destination.
    pub destination: Coordinate,
}

impl Command for PreviewTrip {
    fn command_type(&self) -> &'static str {
        "trip.preview_trip"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        Uuid::nil()
    }
}

/// Command to create and start a trip.
#[derive(Debug, Clone)]
pub struct CreateTrip {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The new trip's identifier.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// Pickup location.
    pub pickup: Coordinate,
    /// Destination.
    pub destination: Coordinate,
    /// Selected ride package slug.
    pub package_slug: String,
}

impl Command for CreateTrip {
    fn command_type(&self) -> &'static str {
        "trip.create_trip"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.trip_id
    }
}

/// Command to record a driver assignment received from the broker.
#[derive(Debug, Clone)]
pub struct AssignDriver {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The broker message that caused this command.
    pub message_id: Uuid,
    /// The trip.
    pub trip_id: Uuid,
    /// The driver.
    pub driver: AssignedDriver,
}

impl Command for AssignDriver {
    fn command_type(&self) -> &'static str {
        "trip.assign_driver"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.trip_id
    }
}

/// Command to attach a payment session.
#[derive(Debug, Clone)]
pub struct RecordPaymentSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The broker message that caused this command.
    pub message_id: Uuid,
    /// The trip.
    pub trip_id: Uuid,
    /// Provider or placeholder session ID.
    pub session_id: String,
}

impl Command for RecordPaymentSession {
    fn command_type(&self) -> &'static str {
        "trip.record_payment_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.trip_id
    }
}

/// Command to settle payment on a trip.
#[derive(Debug, Clone)]
pub struct SettlePayment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The broker message that caused this command.
    pub message_id: Uuid,
    /// The trip.
    pub trip_id: Uuid,
    /// How payment ended.
    pub outcome: PaymentOutcome,
}

impl Command for SettlePayment {
    fn command_type(&self) -> &'static str {
        "trip.settle_payment"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.trip_id
    }
}

/// Command to cancel a trip on the rider's request.
#[derive(Debug, Clone)]
pub struct CancelTrip {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The trip.
    pub trip_id: Uuid,
    /// Why the trip is cancelled.
    pub reason: String,
}

impl Command for CancelTrip {
    fn command_type(&self) -> &'static str {
        "trip.cancel_trip"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.trip_id
    }
}

/// Command to cancel a trip no driver could serve.
#[derive(Debug, Clone)]
pub struct CompensateMissingDriver {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The broker message that caused this command.
    pub message_id: Uuid,
    /// The trip.
    pub trip_id: Uuid,
    /// The package nobody could serve.
    pub package_slug: String,
}

impl Command for CompensateMissingDriver {
    fn command_type(&self) -> &'static str {
        "trip.compensate_missing_driver"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.trip_id
    }
}
