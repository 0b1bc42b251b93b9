//! Per-key async locks.
//!
//! Serializes check-then-apply sections for a single aggregate while letting
//! different aggregates proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// A registry of async mutexes keyed by aggregate ID.
///
/// Entries are held weakly, so a key's mutex is dropped once no guard or
/// waiter references it.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<Uuid, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: Uuid) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            map.retain(|_, weak| weak.strong_count() > 0);
            if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
                existing
            } else {
                let created = Arc::new(AsyncMutex::new(()));
                map.insert(key, Arc::downgrade(&created));
                created
            }
        };
        mutex.lock_owned().await
    }

    /// Number of keys with a live mutex.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        // Arrange
        let locks = Arc::new(KeyedLocks::new());
        let key = Uuid::new_v4();
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        // Act
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let in_section = Arc::clone(&in_section);
            let max_seen = Arc::clone(&max_seen);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(key).await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Assert
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::new();
        let _first = locks.lock(Uuid::new_v4()).await;

        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(Uuid::new_v4()))
            .await;

        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyedLocks::new();
        {
            let _guard = locks.lock(Uuid::new_v4()).await;
            assert_eq!(locks.active_keys(), 1);
        }
        assert_eq!(locks.active_keys(), 0);
    }
}
