//! Delayed, bounded redelivery of envelopes a handler asked to retry.
//!
//! A retried delivery is copied into `<queue>.retry`, whose messages expire
//! after [`RedeliveryPolicy::delay`] and dead-letter back into `<queue>`. The
//! copy carries its attempt number in [`ATTEMPT_HEADER`]. Once
//! [`RedeliveryPolicy::max_attempts`] is reached the envelope is parked in
//! `<queue>.parked` for an operator instead of being retried again.

use std::time::Duration;

use crate::bus::Disposition;

/// Header holding the 1-based attempt number of a redelivered copy.
pub const ATTEMPT_HEADER: &str = "x-rideshare-attempt";

/// Header holding the topic of a redelivered copy. Dead-lettering rewrites
/// the routing key to the queue name.
pub const TOPIC_HEADER: &str = "x-rideshare-topic";

/// How often and how far apart a retried envelope is redelivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Attempts before parking, including the first delivery.
    pub max_attempts: u32,
    /// Wait between a retry request and the next attempt.
    pub delay: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(2),
        }
    }
}

/// What the consumer does with a handled delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Acknowledge; the envelope is done.
    Ack,
    /// Reject without requeue.
    Reject,
    /// Copy into the retry queue as attempt `next_attempt`, then acknowledge.
    Retry {
        /// Attempt number the copy will carry.
        next_attempt: u32,
    },
    /// Copy into the parking queue, then acknowledge.
    Park,
}

impl RedeliveryPolicy {
    /// Settlement for a delivery on its `attempt`-th try that ended with
    /// `disposition`.
    #[must_use]
    pub fn settle(&self, disposition: Disposition, attempt: u32) -> Settlement {
        match disposition {
            Disposition::Ack => Settlement::Ack,
            Disposition::Reject => Settlement::Reject,
            Disposition::Requeue if attempt >= self.max_attempts => Settlement::Park,
            Disposition::Requeue => Settlement::Retry {
                next_attempt: attempt.saturating_add(1),
            },
        }
    }

    /// Message TTL of the retry queue, in milliseconds.
    #[must_use]
    pub fn delay_millis(&self) -> u32 {
        u32::try_from(self.delay.as_millis()).unwrap_or(u32::MAX)
    }
}

/// Name of the delay queue behind `queue`.
#[must_use]
pub fn retry_queue(queue: &str) -> String {
    format!("{queue}.retry")
}

/// Name of the parking queue behind `queue`.
#[must_use]
pub fn parking_queue(queue: &str) -> String {
    format!("{queue}.parked")
}
