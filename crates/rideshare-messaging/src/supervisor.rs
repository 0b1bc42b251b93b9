//! Restarts long-running consumer loops.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exponential restart delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first restart.
    pub initial: Duration,
    /// Upper bound on the delay.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    /// The delay after `current`: doubled, capped at `max`.
    #[must_use]
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

/// Spawns `run` and restarts it whenever it fails, until `shutdown` fires.
///
/// A loop that returns `Ok` while the token is still live is restarted
/// immediately with the delay reset.
pub fn spawn_supervised<F, Fut, E>(
    name: &'static str,
    shutdown: CancellationToken,
    backoff: Backoff,
    mut run: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        let mut delay = backoff.initial;
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match run().await {
                Ok(()) => {
                    delay = backoff.initial;
                    if shutdown.is_cancelled() {
                        break;
                    }
                    warn!(task = name, "supervised task returned, restarting");
                }
                Err(e) => {
                    error!(task = name, error = %e, retry_in_ms = delay.as_millis(), "supervised task failed");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    delay = backoff.next(delay);
                }
            }
        }
        info!(task = name, "supervised task stopped");
    })
}
