//! Test clock — deterministic `Clock` implementation for tests.

use chrono::{DateTime, TimeZone, Utc};
use rideshare_core::clock::Clock;

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// A clock fixed at the given Unix timestamp (seconds).
    ///
    /// # Panics
    ///
    /// Panics if `secs` is out of chrono's range.
    #[must_use]
    pub fn at_unix(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().expect("timestamp in range"))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
