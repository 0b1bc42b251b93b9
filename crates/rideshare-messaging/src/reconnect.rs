//! A shared link that is replaced once it stops being healthy.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Holds the current link. Callers get a clone of the `Arc`; the first caller
/// to find it unhealthy (or invalidated) opens a replacement while the others
/// wait on the write lock.
pub struct Reconnecting<L> {
    current: RwLock<Option<Arc<L>>>,
}

impl<L> Reconnecting<L> {
    /// Starts with an open link.
    #[must_use]
    pub fn new(initial: L) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(initial))),
        }
    }

    /// Returns the current link if `healthy` holds for it, otherwise opens a
    /// new one with `connect` and keeps it.
    ///
    /// # Errors
    ///
    /// Returns the error from `connect`; the slot stays empty so the next call
    /// tries again.
    pub async fn get<H, F, Fut, E>(&self, healthy: H, connect: F) -> Result<Arc<L>, E>
    where
        H: Fn(&L) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<L, E>>,
    {
        if let Some(link) = self.current.read().await.as_ref() {
            if healthy(link) {
                return Ok(Arc::clone(link));
            }
        }

        let mut slot = self.current.write().await;
        if let Some(link) = slot.as_ref() {
            if healthy(link) {
                return Ok(Arc::clone(link));
            }
        }
        *slot = None;
        let link = Arc::new(connect().await?);
        *slot = Some(Arc::clone(&link));
        Ok(link)
    }

    /// Forgets `stale` so the next [`get`](Self::get) reconnects. A link that
    /// already replaced `stale` is kept.
    pub async fn invalidate(&self, stale: &Arc<L>) {
        let mut slot = self.current.write().await;
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, stale))
        {
            *slot = None;
        }
    }

    /// Removes and returns the current link.
    pub async fn take(&self) -> Option<Arc<L>> {
        self.current.write().await.take()
    }
}
