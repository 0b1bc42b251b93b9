//! Test payment gateway.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rideshare_core::error::DomainError;
use rideshare_core::payment::{PaymentGateway, SessionRequest};

#[derive(Debug, Clone)]
enum Behavior {
    Succeed(String),
    Fail(String),
    Hang(Duration),
}

/// A scripted payment provider.
#[derive(Debug)]
pub struct StubPaymentGateway {
    behavior: Behavior,
    requests: Mutex<Vec<SessionRequest>>,
}

impl StubPaymentGateway {
    /// Always returns `session_id`.
    #[must_use]
    pub fn succeeding(session_id: &str) -> Self {
        Self::with(Behavior::Succeed(session_id.to_owned()))
    }

    /// Always fails with a dependency error.
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self::with(Behavior::Fail(reason.to_owned()))
    }

    /// Sleeps for `delay` before answering with a session ID.
    #[must_use]
    pub fn hanging(delay: Duration) -> Self {
        Self::with(Behavior::Hang(delay))
    }

    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received, including ones that later timed out.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubPaymentGateway {
    async fn open_session(&self, request: &SessionRequest) -> Result<String, DomainError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.behavior {
            Behavior::Succeed(id) => Ok(id.clone()),
            Behavior::Fail(reason) => Err(DomainError::Dependency(reason.clone())),
            Behavior::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("cs_test_slow".to_owned())
            }
        }
    }
}
