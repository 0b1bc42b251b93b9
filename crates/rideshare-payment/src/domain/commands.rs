//! Commands for the payment context.

use rideshare_core::command::Command;
use uuid::Uuid;

use super::aggregates::{SessionDetails, Settlement};

/// Command to open a checkout session for an assigned trip.
#[derive(Debug, Clone)]
pub struct OpenPaymentSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The broker message that triggered the command.
    pub message_id: Uuid,
    /// The trip being paid for.
    pub trip_id: Uuid,
    /// What to charge.
    pub details: SessionDetails,
}

impl Command for OpenPaymentSession {
    fn command_type(&self) -> &'static str {
        "payment.open_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.trip_id
    }
}

/// Command to record the provider's verdict on a session.
#[derive(Debug, Clone)]
pub struct SettlePaymentSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The broker message that triggered the command.
    pub message_id: Uuid,
    /// The trip being paid for.
    pub trip_id: Uuid,
    /// Provider session ID, when the webhook carried one.
    pub session_id: Option<String>,
    /// Paid or not.
    pub settlement: Settlement,
}

impl Command for SettlePaymentSession {
    fn command_type(&self) -> &'static str {
        "payment.settle_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.trip_id
    }
}
