//! Test publishers.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rideshare_messaging::bus::Publisher;
use rideshare_messaging::envelope::Envelope;
use rideshare_messaging::error::MessagingError;

/// A publisher that keeps every envelope it is given.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Envelope>>,
}

impl RecordingPublisher {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<Envelope> {
        self.published.lock().unwrap().clone()
    }

    /// Envelopes published on `topic`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published_on(&self, topic: &str) -> Vec<Envelope> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.topic() == topic)
            .cloned()
            .collect()
    }

    /// Topics in publish order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn topics(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.topic().to_owned())
            .collect()
    }

    /// Removes and returns everything published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn drain(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.published.lock().unwrap())
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, envelope: &Envelope) -> Result<(), MessagingError> {
        self.published.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// A publisher that fails a fixed number of times, then records like
/// [`RecordingPublisher`].
#[derive(Debug)]
pub struct FailingPublisher {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    inner: RecordingPublisher,
}

impl FailingPublisher {
    /// Fails every publish.
    #[must_use]
    pub fn always() -> Self {
        Self::failing_times(usize::MAX)
    }

    /// Fails the first `failures` publishes.
    #[must_use]
    pub fn failing_times(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            inner: RecordingPublisher::new(),
        }
    }

    /// Total publish attempts, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Envelopes that were eventually accepted.
    pub fn published(&self) -> Vec<Envelope> {
        self.inner.published()
    }
}

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, envelope: &Envelope) -> Result<(), MessagingError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if failing {
            return Err(MessagingError::Publish("broker unavailable".into()));
        }
        self.inner.publish(envelope).await
    }
}
