//! Broker consumer that opens and settles payment sessions.
//!
//! `driver.assigned` opens a session and announces it with
//! `payment.session_created`. The announcement is repeated on every delivery,
//! under a message ID derived from the trip, so a publish that failed after
//! the append is recovered by redelivery and the trip side sees duplicates
//! only.

use std::sync::Arc;

use async_trait::async_trait;
use rideshare_core::clock::Clock;
use rideshare_core::error::DomainError;
use rideshare_core::lock::KeyedLocks;
use rideshare_core::repository::EventRepository;
use rideshare_messaging::bus::{EventHandler, Publisher};
use rideshare_messaging::contracts::{
    DriverAssignedData, PaymentFailedData, PaymentSessionCreatedData, PaymentStatusUpdateData,
};
use rideshare_messaging::envelope::Envelope;
use rideshare_messaging::topics;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::command_handlers::{handle_open_session, handle_settle_session};
use crate::application::query_handlers::PaymentSessionView;
use crate::domain::aggregates::{SessionDetails, Settlement};
use crate::domain::commands::{OpenPaymentSession, SettlePaymentSession};
use crate::gateway::GatewayAdapter;
use crate::state::AppState;

/// Turns driver assignments into payment sessions and records settlements.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    clock: Arc<dyn Clock + Send + Sync>,
    event_repository: Arc<dyn EventRepository>,
    publisher: Arc<dyn Publisher>,
    gateway: Arc<GatewayAdapter>,
    locks: Arc<KeyedLocks>,
}

impl PaymentOrchestrator {
    /// Creates an orchestrator sharing the service's handles.
    #[must_use]
    pub fn new(state: &AppState) -> Self {
        Self {
            clock: Arc::clone(&state.clock),
            event_repository: Arc::clone(&state.event_repository),
            publisher: Arc::clone(&state.publisher),
            gateway: Arc::clone(&state.gateway),
            locks: Arc::clone(&state.locks),
        }
    }

    async fn open(&self, envelope: &Envelope) -> Result<(), DomainError> {
        let data: DriverAssignedData = envelope
            .decode()
            .map_err(|e| DomainError::Validation(e.to_string()))?;
        let command = OpenPaymentSession {
            correlation_id: envelope.correlation_id(),
            message_id: envelope.message_id(),
            trip_id: data.trip_id,
            details: SessionDetails {
                user_id: data.user_id,
                driver_id: data.driver.driver_id,
                amount_in_cents: data.fare.total_price_in_cents,
                currency: data.fare.currency,
            },
        };

        let session = {
            let _guard = self.locks.lock(command.trip_id).await;
            handle_open_session(
                &command,
                self.clock.as_ref(),
                self.event_repository.as_ref(),
                &self.gateway,
            )
            .await?
            .session
        };
        self.announce(&session, envelope.correlation_id()).await
    }

    async fn announce(
        &self,
        session: &PaymentSessionView,
        correlation_id: Uuid,
    ) -> Result<(), DomainError> {
        let session_id = session
            .session_id
            .clone()
            .ok_or_else(|| DomainError::AggregateNotFound(session.trip_id))?;
        let data = PaymentSessionCreatedData {
            trip_id: session.trip_id,
            user_id: session.user_id.clone(),
            driver_id: session.driver_id.clone(),
            session_id,
            amount_in_cents: session.amount_in_cents,
            currency: session.currency.clone(),
            mocked: session.mocked,
        };
        let envelope = Envelope::new(
            topics::PAYMENT_SESSION_CREATED,
            &session.user_id,
            &data,
            correlation_id,
        )
        .map_err(|e| DomainError::Validation(e.to_string()))?
        .with_message_id(Uuid::new_v5(
            &session.trip_id,
            topics::PAYMENT_SESSION_CREATED.as_bytes(),
        ));

        self.publisher
            .publish(&envelope)
            .await
            .map_err(|e| DomainError::Dependency(e.to_string()))?;
        info!(
            trip_id = %session.trip_id,
            owner_id = %session.user_id,
            mocked = session.mocked,
            "payment session announced"
        );
        Ok(())
    }

    async fn settle(&self, command: SettlePaymentSession) -> Result<(), DomainError> {
        let _guard = self.locks.lock(command.trip_id).await;
        handle_settle_session(
            &command,
            self.clock.as_ref(),
            self.event_repository.as_ref(),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl EventHandler for PaymentOrchestrator {
    fn name(&self) -> &'static str {
        "payment-orchestrator"
    }

    async fn handle(&self, envelope: &Envelope) -> Result<(), DomainError> {
        let correlation_id = envelope.correlation_id();
        let message_id = envelope.message_id();

        match envelope.topic() {
            topics::DRIVER_ASSIGNED => self.open(envelope).await,
            topics::PAYMENT_SUCCESS => {
                let data: PaymentStatusUpdateData = envelope
                    .decode()
                    .map_err(|e| DomainError::Validation(e.to_string()))?;
                self.settle(SettlePaymentSession {
                    correlation_id,
                    message_id,
                    trip_id: data.trip_id,
                    session_id: data.session_id,
                    settlement: Settlement::Succeeded,
                })
                .await
            }
            topics::PAYMENT_FAILED => {
                let data: PaymentFailedData = envelope
                    .decode()
                    .map_err(|e| DomainError::Validation(e.to_string()))?;
                self.settle(SettlePaymentSession {
                    correlation_id,
                    message_id,
                    trip_id: data.trip_id,
                    session_id: data.session_id,
                    settlement: Settlement::Failed {
                        reason: data.reason,
                    },
                })
                .await
            }
            other => {
                debug!(topic = other, "no payment action for topic");
                Ok(())
            }
        }
    }
}
