//! Payment gateway adapter.
//!
//! Opening a session never fails the saga: when the provider is switched off,
//! slow or failing, the adapter answers with a mock session ID derived from
//! the trip, and the caller learns which branch was taken.

pub mod stripe;

use std::sync::Arc;
use std::time::Duration;

use rideshare_core::deadline::{FallbackReason, Outcome, call_with_deadline};
use rideshare_core::payment::{PaymentGateway, SessionRequest};
use tracing::info;

/// Default bound on a provider call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(2);

/// Wraps an optional provider with a deadline and the mock fallback.
#[derive(Clone)]
pub struct GatewayAdapter {
    provider: Option<Arc<dyn PaymentGateway>>,
    deadline: Duration,
}

impl GatewayAdapter {
    /// An adapter calling `provider`, bounded by `deadline`.
    #[must_use]
    pub fn live(provider: Arc<dyn PaymentGateway>, deadline: Duration) -> Self {
        Self {
            provider: Some(provider),
            deadline,
        }
    }

    /// An adapter that always answers with mock sessions.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            provider: None,
            deadline: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    /// Returns `true` if a provider is configured.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.provider.is_some()
    }

    /// Opens a session, or falls back to the request's mock session ID.
    pub async fn open_session(&self, request: &SessionRequest) -> Outcome<String> {
        let Some(provider) = &self.provider else {
            info!(trip_id = %request.trip_id, "payment gateway disabled, using mock session");
            return Outcome::Fallback {
                value: request.mock_session_id(),
                reason: FallbackReason::Disabled,
            };
        };
        call_with_deadline(
            "payment gateway",
            self.deadline,
            provider.open_session(request),
            || request.mock_session_id(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_core::payment::is_mock_session;
    use rideshare_test_support::StubPaymentGateway;
    use uuid::Uuid;

    fn request() -> SessionRequest {
        SessionRequest {
            amount_in_cents: 1250,
            currency: "usd".into(),
            trip_id: Uuid::new_v4(),
            user_id: "u1".into(),
            driver_id: "D1".into(),
        }
    }

    #[tokio::test]
    async fn test_live_provider_session_is_returned() {
        // Arrange
        let stub = Arc::new(StubPaymentGateway::succeeding("cs_live_1"));
        let adapter = GatewayAdapter::live(stub.clone(), DEFAULT_GATEWAY_TIMEOUT);
        let request = request();

        // Act
        let outcome = adapter.open_session(&request).await;

        // Assert
        assert_eq!(outcome, Outcome::Completed("cs_live_1".to_owned()));
        assert_eq!(stub.requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_disabled_adapter_mocks_without_calling_out() {
        let adapter = GatewayAdapter::disabled();
        let request = request();

        let outcome = adapter.open_session(&request).await;

        assert_eq!(
            outcome,
            Outcome::Fallback {
                value: request.mock_session_id(),
                reason: FallbackReason::Disabled,
            }
        );
    }

    #[tokio::test]
    async fn test_failing_provider_falls_back_to_mock() {
        let adapter = GatewayAdapter::live(
            Arc::new(StubPaymentGateway::failing("card network down")),
            DEFAULT_GATEWAY_TIMEOUT,
        );

        let outcome = adapter.open_session(&request()).await;

        assert!(outcome.is_fallback());
        assert!(is_mock_session(&outcome.into_value()));
    }

    #[tokio::test]
    async fn test_slow_provider_falls_back_at_deadline() {
        // Arrange
        let adapter = GatewayAdapter::live(
            Arc::new(StubPaymentGateway::hanging(Duration::from_secs(30))),
            Duration::from_millis(50),
        );

        // Act
        let outcome = adapter.open_session(&request()).await;

        // Assert
        assert!(matches!(
            outcome,
            Outcome::Fallback {
                reason: FallbackReason::TimedOut(_),
                ..
            }
        ));
    }
}
