//! Shared application state.

use std::sync::Arc;

use rideshare_messaging::bus::Publisher;
use rideshare_transport::rpc::RpcTimeouts;

use crate::config::ServiceEndpoints;
use crate::signature::WebhookVerifier;
use crate::webhook::PublishRetry;

/// Application state shared across all request handlers.
///
/// Holds addresses, not connections: each request opens its own RPC channel.
#[derive(Clone)]
pub struct AppState {
    /// Internal service addresses.
    pub endpoints: Arc<ServiceEndpoints>,
    /// Bounds on outbound RPC calls.
    pub timeouts: RpcTimeouts,
    /// Client for internal REST calls.
    pub http: reqwest::Client,
    /// Broker publisher for settlement events.
    pub publisher: Arc<dyn Publisher>,
    /// Webhook verifier; `None` disables webhook ingestion.
    pub webhook_verifier: Option<Arc<WebhookVerifier>>,
    /// Retry policy for settlement publishes.
    pub publish_retry: PublishRetry,
}

impl AppState {
    /// Create new application state with webhook ingestion disabled.
    #[must_use]
    pub fn new(
        endpoints: ServiceEndpoints,
        timeouts: RpcTimeouts,
        http: reqwest::Client,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
            timeouts,
            http,
            publisher,
            webhook_verifier: None,
            publish_retry: PublishRetry::default(),
        }
    }

    /// Enables webhook ingestion.
    #[must_use]
    pub fn with_webhook_verifier(mut self, verifier: WebhookVerifier) -> Self {
        self.webhook_verifier = Some(Arc::new(verifier));
        self
    }

    /// Replaces the settlement publish retry policy.
    #[must_use]
    pub fn with_publish_retry(mut self, retry: PublishRetry) -> Self {
        self.publish_retry = retry;
        self
    }
}
