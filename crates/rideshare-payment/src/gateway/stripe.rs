//! Hosted-checkout provider over its REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rideshare_core::error::DomainError;
use rideshare_core::payment::{PaymentGateway, SessionRequest};
use serde::Deserialize;
use tracing::debug;

/// Product name shown on the checkout page.
const LINE_ITEM_NAME: &str = "Ride Payment";

/// Provider endpoints and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeSettings {
    /// API base URL, e.g. `https://api.stripe.com`.
    pub base_url: String,
    /// Secret API key.
    pub secret_key: String,
    /// Where the rider lands after paying.
    pub success_url: String,
    /// Where the rider lands after abandoning checkout.
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
}

/// Opens checkout sessions at `POST /v1/checkout/sessions`.
pub struct StripeCheckout {
    settings: StripeSettings,
    client: Client,
}

impl StripeCheckout {
    /// Builds a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Dependency` if the HTTP client cannot be built.
    pub fn new(mut settings: StripeSettings, timeout: Duration) -> Result<Self, DomainError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Dependency(format!("payment http client: {e}")))?;
        let trimmed_len = settings.base_url.trim_end_matches('/').len();
        settings.base_url.truncate(trimmed_len);
        Ok(Self { settings, client })
    }

    /// Form fields for a one-item payment-mode session. The trip, rider and
    /// driver travel as metadata so the webhook can route the settlement.
    fn form_fields(&self, request: &SessionRequest) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_owned()),
            ("success_url", self.settings.success_url.clone()),
            ("cancel_url", self.settings.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_owned()),
            (
                "line_items[0][price_data][currency]",
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount_in_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                LINE_ITEM_NAME.to_owned(),
            ),
            ("metadata[trip_id]", request.trip_id.to_string()),
            ("metadata[user_id]", request.user_id.clone()),
            ("metadata[driver_id]", request.driver_id.clone()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for StripeCheckout {
    async fn open_session(&self, request: &SessionRequest) -> Result<String, DomainError> {
        let url = format!("{}/v1/checkout/sessions", self.settings.base_url);
        debug!(trip_id = %request.trip_id, %url, "opening checkout session");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.settings.secret_key)
            .form(&self.form_fields(request))
            .send()
            .await
            .map_err(|e| DomainError::Dependency(format!("payment provider unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Dependency(format!(
                "payment provider refused session: status {status}"
            )));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| DomainError::Dependency(format!("payment provider response: {e}")))?;
        Ok(session.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn checkout(base_url: &str) -> StripeCheckout {
        StripeCheckout::new(
            StripeSettings {
                base_url: base_url.into(),
                secret_key: "sk_test_123".into(),
                success_url: "http://localhost:3000?payment=success".into(),
                cancel_url: "http://localhost:3000?payment=cancel".into(),
            },
            Duration::from_millis(200),
        )
        .unwrap()
    }

    #[test]
    fn test_form_carries_amount_and_identity_metadata() {
        // Arrange
        let trip_id = Uuid::new_v4();
        let request = SessionRequest {
            amount_in_cents: 1250,
            currency: "usd".into(),
            trip_id,
            user_id: "u1".into(),
            driver_id: "D1".into(),
        };

        // Act
        let fields = checkout("https://api.stripe.com/").form_fields(&request);

        // Assert
        let get = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1250"));
        assert_eq!(get("metadata[trip_id]"), Some(trip_id.to_string().as_str()));
        assert_eq!(get("metadata[user_id]"), Some("u1"));
        assert_eq!(get("metadata[driver_id]"), Some("D1"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let checkout = checkout("https://api.stripe.com///");

        assert_eq!(checkout.settings.base_url, "https://api.stripe.com");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_dependency_error() {
        let checkout = checkout("http://127.0.0.1:1");
        let request = SessionRequest {
            amount_in_cents: 100,
            currency: "usd".into(),
            trip_id: Uuid::new_v4(),
            user_id: "u1".into(),
            driver_id: "D1".into(),
        };

        let result = checkout.open_session(&request).await;

        assert!(matches!(result, Err(DomainError::Dependency(_))));
    }
}
