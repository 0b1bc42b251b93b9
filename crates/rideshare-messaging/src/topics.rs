//! Topic names, queue bindings and topic matching.
//!
//! Topics are dot-separated words. Bindings may use `*` (exactly one word)
//! and `#` (zero or more words), matching the broker's topic-exchange rules.

/// The topic exchange every service publishes to.
pub const EXCHANGE: &str = "rideshare.events";

/// A trip was persisted in `Started`.
pub const TRIP_CREATED: &str = "trip.created";
/// A driver accepted a trip.
pub const DRIVER_ASSIGNED: &str = "driver.assigned";
/// No driver is available for a trip's ride package.
pub const DRIVER_NOT_FOUND: &str = "driver.not_found";
/// A payment session was opened for a trip.
pub const PAYMENT_SESSION_CREATED: &str = "payment.session_created";
/// The provider confirmed payment.
pub const PAYMENT_SUCCESS: &str = "payment.success";
/// The provider reported a failed or expired payment.
pub const PAYMENT_FAILED: &str = "payment.failed";

/// A durable queue and the topic patterns bound to it.
///
/// One queue per consumer group; each service instance competes on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name.
    pub name: &'static str,
    /// Binding patterns on [`EXCHANGE`].
    pub bindings: &'static [&'static str],
}

impl QueueSpec {
    /// Returns `true` if any binding of this queue matches `topic`.
    #[must_use]
    pub fn accepts(&self, topic: &str) -> bool {
        self.bindings
            .iter()
            .any(|pattern| topic_matches(pattern, topic))
    }
}

/// Queue consumed by the trip service's state machine.
pub const TRIP_SERVICE_QUEUE: QueueSpec = QueueSpec {
    name: "trip_service.saga",
    bindings: &["driver.*", "payment.*"],
};

/// Queue consumed by the driver matching consumer.
pub const DRIVER_SERVICE_QUEUE: QueueSpec = QueueSpec {
    name: "driver_service.trip_created",
    bindings: &[TRIP_CREATED],
};

/// Queue consumed by the payment orchestrator.
pub const PAYMENT_SERVICE_QUEUE: QueueSpec = QueueSpec {
    name: "payment_service.saga",
    bindings: &[DRIVER_ASSIGNED, PAYMENT_SUCCESS, PAYMENT_FAILED],
};

/// Returns `true` if a concrete `topic` matches a binding `pattern`.
#[must_use]
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let topic: Vec<&str> = topic.split('.').collect();
    matches_words(&pattern, &topic)
}

fn matches_words(pattern: &[&str], topic: &[&str]) -> bool {
    match (pattern.split_first(), topic.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            matches_words(rest, topic) || (!topic.is_empty() && matches_words(pattern, &topic[1..]))
        }
        (Some((&"*", rest)), Some((_, topic_rest))) => matches_words(rest, topic_rest),
        (Some((word, rest)), Some((candidate, topic_rest))) => {
            word == candidate && matches_words(rest, topic_rest)
        }
        _ => false,
    }
}

/// Returns `true` if `topic` is a concrete, publishable topic name.
#[must_use]
pub fn is_concrete(topic: &str) -> bool {
    !topic.is_empty()
        && topic
            .split('.')
            .all(|word| !word.is_empty() && word != "*" && word != "#")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern_matches_only_itself() {
        assert!(topic_matches("trip.created", "trip.created"));
        assert!(!topic_matches("trip.created", "trip.started"));
        assert!(!topic_matches("trip.created", "trip.created.v2"));
    }

    #[test]
    fn test_star_matches_exactly_one_word() {
        assert!(topic_matches("payment.*", "payment.success"));
        assert!(topic_matches("payment.*", "payment.session_created"));
        assert!(!topic_matches("payment.*", "payment"));
        assert!(!topic_matches("payment.*", "payment.success.retry"));
    }

    #[test]
    fn test_hash_matches_zero_or_more_words() {
        assert!(topic_matches("#", "trip.created"));
        assert!(topic_matches("trip.#", "trip"));
        assert!(topic_matches("trip.#", "trip.created.v2"));
        assert!(!topic_matches("trip.#", "driver.assigned"));
    }

    #[test]
    fn test_trip_service_queue_receives_driver_and_payment_topics() {
        assert!(TRIP_SERVICE_QUEUE.accepts(DRIVER_ASSIGNED));
        assert!(TRIP_SERVICE_QUEUE.accepts(DRIVER_NOT_FOUND));
        assert!(TRIP_SERVICE_QUEUE.accepts(PAYMENT_SESSION_CREATED));
        assert!(TRIP_SERVICE_QUEUE.accepts(PAYMENT_SUCCESS));
        assert!(TRIP_SERVICE_QUEUE.accepts(PAYMENT_FAILED));
        assert!(!TRIP_SERVICE_QUEUE.accepts(TRIP_CREATED));
    }

    #[test]
    fn test_payment_queue_does_not_receive_its_own_session_events() {
        assert!(PAYMENT_SERVICE_QUEUE.accepts(DRIVER_ASSIGNED));
        assert!(!PAYMENT_SERVICE_QUEUE.accepts(PAYMENT_SESSION_CREATED));
    }

    #[test]
    fn test_wildcards_are_not_concrete() {
        assert!(is_concrete("payment.success"));
        assert!(!is_concrete("payment.*"));
        assert!(!is_concrete("trip..created"));
        assert!(!is_concrete(""));
    }
}
