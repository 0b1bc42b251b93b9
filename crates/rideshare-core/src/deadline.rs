//! Call-with-deadline combinator.
//!
//! Bounds an external call by a fixed timeout and substitutes a fallback value
//! when the call errors or the deadline passes. Callers learn which branch was
//! taken through [`Outcome`], so degraded results stay distinguishable.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Why a fallback value was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The call did not finish before the deadline.
    TimedOut(Duration),
    /// The call finished with an error.
    Failed(String),
    /// The dependency is switched off by configuration.
    Disabled,
}

/// Result of a deadline-bounded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The call completed in time.
    Completed(T),
    /// The fallback was produced instead.
    Fallback {
        /// The substituted value.
        value: T,
        /// Why the fallback was used.
        reason: FallbackReason,
    },
}

impl<T> Outcome<T> {
    /// Returns the value regardless of branch.
    pub fn into_value(self) -> T {
        match self {
            Self::Completed(value) | Self::Fallback { value, .. } => value,
        }
    }

    /// Returns `true` if the fallback branch was taken.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Runs `call` with a `deadline`; on error or expiry returns `fallback()`.
///
/// The in-flight call is dropped (cancelled) when the deadline passes.
pub async fn call_with_deadline<T, E, Fut, F>(
    dependency: &str,
    deadline: Duration,
    call: Fut,
    fallback: F,
) -> Outcome<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    F: FnOnce() -> T,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => Outcome::Completed(value),
        Ok(Err(err)) => {
            warn!(dependency, error = %err, "dependency call failed, using fallback");
            Outcome::Fallback {
                value: fallback(),
                reason: FallbackReason::Failed(err.to_string()),
            }
        }
        Err(_) => {
            warn!(dependency, ?deadline, "dependency call timed out, using fallback");
            Outcome::Fallback {
                value: fallback(),
                reason: FallbackReason::TimedOut(deadline),
            }
        }
    }
}
