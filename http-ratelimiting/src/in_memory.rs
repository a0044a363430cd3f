//! Process-local [`RateLimiter`] implementation.

use crate::{bucket_lock::InMemoryBucketLock, AcquireFuture, BucketLock, LockGloballyFuture, RateLimiter};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::RwLock;

/// [`RateLimiter`] that keeps its bucket map and global gate in this
/// process's memory.
///
/// This is the right choice for a bot running as a single process. A bot
/// split across multiple processes sharing one token must instead use an
/// implementation that coordinates buckets externally, since two
/// [`InMemoryRateLimiter`]s have no way to learn about each other's state.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    buckets: Mutex<HashMap<String, Arc<InMemoryBucketLock>>>,
    /// Held as a write lock while the global ratelimit is in effect; normal
    /// acquisitions take (and immediately drop) a read lock, so they pass
    /// through freely except while a global lock is being held.
    global: Arc<RwLock<()>>,
}

impl InMemoryRateLimiter {
    /// Create a new, empty ratelimiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn acquire(&self, bucket: String) -> AcquireFuture<'_> {
        Box::pin(async move {
            let lock = {
                let mut buckets = self.buckets.lock().expect("bucket map poisoned");
                Arc::clone(
                    buckets
                        .entry(bucket)
                        .or_insert_with(|| Arc::new(InMemoryBucketLock::new())),
                )
            };

            // Block only while a global lock is actually held.
            drop(self.global.read().await);

            lock
        })
    }

    fn lock_globally(&self, release_after: Duration) -> LockGloballyFuture<'_> {
        Box::pin(async move {
            let global = Arc::clone(&self.global);

            tokio::spawn(async move {
                let guard = global.write().await;
                tokio::time::sleep(release_after).await;
                drop(guard);
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryRateLimiter;
    use crate::RateLimiter;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, sync::Arc, time::Duration};

    assert_impl_all!(InMemoryRateLimiter: RateLimiter, Debug, Send, Sync);

    #[tokio::test]
    async fn distinct_buckets_get_distinct_locks() {
        let limiter = InMemoryRateLimiter::new();

        let a = limiter.acquire("a".to_owned()).await;
        let b = limiter.acquire("b".to_owned()).await;

        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn equal_bucket_keys_share_a_lock() {
        let limiter = InMemoryRateLimiter::new();

        let a = limiter.acquire("same".to_owned()).await;
        let b = limiter.acquire("same".to_owned()).await;

        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test(start_paused = true)]
    async fn global_lock_blocks_unrelated_bucket() {
        let limiter = Arc::new(InMemoryRateLimiter::new());

        limiter.lock_globally(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;

        let waiter = Arc::clone(&limiter);
        let waited = tokio::spawn(async move {
            waiter.acquire("anything".to_owned()).await;
        });

        tokio::task::yield_now().await;
        assert!(!waited.is_finished());

        tokio::time::advance(Duration::from_millis(50)).await;
        waited.await.unwrap();
    }
}
