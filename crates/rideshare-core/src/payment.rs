//! Payment gateway port.
//!
//! The gateway is an external hosted-checkout provider. It is stateless from
//! our side: it turns an amount plus identifying metadata into a session ID.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;

/// Prefix of every placeholder session ID.
pub const MOCK_SESSION_PREFIX: &str = "cs_test_mock_session_";

/// What the provider needs to open a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Amount in the currency's minor unit.
    pub amount_in_cents: i64,
    /// ISO 4217 currency code, lowercase.
    pub currency: String,
    /// The trip being paid for.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// The driver.
    pub driver_id: String,
}

impl SessionRequest {
    /// The placeholder session ID for this request's trip.
    ///
    /// Deterministic, so a redelivered trigger opens the same mock session.
    #[must_use]
    pub fn mock_session_id(&self) -> String {
        format!("{MOCK_SESSION_PREFIX}{}", self.trip_id.simple())
    }
}

/// Returns `true` if `session_id` is a placeholder rather than a provider ID.
#[must_use]
pub fn is_mock_session(session_id: &str) -> bool {
    session_id.starts_with(MOCK_SESSION_PREFIX)
}

/// An external hosted-checkout provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout session and returns the provider's session ID.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Dependency` if the provider is unreachable or
    /// refuses the request.
    async fn open_session(&self, request: &SessionRequest) -> Result<String, DomainError>;
}
