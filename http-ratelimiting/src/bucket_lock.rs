//! The scoped lock guarding a single ratelimit bucket.

use std::{fmt::Debug, future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio::sync::Semaphore;

/// Future returned by [`BucketLock::acquire`].
pub type LockFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A scoped mutex for one ratelimit bucket.
///
/// At most one caller holds a given bucket's lock at a time. Unlike a plain
/// mutex, releasing is not tied to dropping a guard: a caller acquires the
/// lock, makes its request, then schedules [`BucketLock::release`] for some
/// point in the future (the server's indicated reset window, or
/// immediately). This lets the lock stay closed after the request that
/// triggered the ratelimit has already returned.
pub trait BucketLock: Debug + Send + Sync {
    /// Block until this bucket's lock is free, then take it.
    fn acquire(&self) -> LockFuture<'_>;

    /// Release the lock after `after` elapses.
    ///
    /// Fire-and-forget: spawns a background release so the caller is never
    /// blocked waiting for the bucket to actually reopen.
    fn release(self: Arc<Self>, after: Duration);
}

/// Process-local [`BucketLock`] backed by a single-permit semaphore.
///
/// A semaphore is used rather than [`tokio::sync::Mutex`] because the
/// permit acquired by [`InMemoryBucketLock::acquire`] must be released from
/// a detached task after a delay, not when the original caller's guard
/// drops; [`tokio::sync::SemaphorePermit::forget`] lets the acquiring call
/// hand that permit off to a timer instead.
#[derive(Debug)]
pub struct InMemoryBucketLock {
    /// Always holds exactly one permit; never closed.
    semaphore: Semaphore,
}

impl Default for InMemoryBucketLock {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBucketLock {
    /// Create a new, immediately-acquirable bucket lock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
        }
    }
}

impl BucketLock for InMemoryBucketLock {
    fn acquire(&self) -> LockFuture<'_> {
        Box::pin(async move {
            let permit = self
                .semaphore
                .acquire()
                .await
                .expect("bucket semaphore is never closed");
            permit.forget();
        })
    }

    fn release(self: Arc<Self>, after: Duration) {
        tokio::spawn(async move {
            if !after.is_zero() {
                tokio::time::sleep(after).await;
            }

            self.semaphore.add_permits(1);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{BucketLock, InMemoryBucketLock};
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, sync::Arc, time::Duration};

    assert_impl_all!(InMemoryBucketLock: BucketLock, Debug, Send, Sync);

    #[tokio::test(start_paused = true)]
    async fn acquire_blocks_until_release() {
        let lock = Arc::new(InMemoryBucketLock::new());

        lock.acquire().await;

        let waiter = Arc::clone(&lock);
        let waited = tokio::spawn(async move {
            waiter.acquire().await;
        });

        tokio::task::yield_now().await;
        assert!(!waited.is_finished());

        Arc::clone(&lock).release(Duration::from_millis(0));
        waited.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn release_after_delays_reacquire() {
        let lock = Arc::new(InMemoryBucketLock::new());
        lock.acquire().await;

        let waiter = Arc::clone(&lock);
        let waited = tokio::spawn(async move {
            waiter.acquire().await;
        });

        Arc::clone(&lock).release(Duration::from_millis(50));

        tokio::task::yield_now().await;
        assert!(!waited.is_finished());

        tokio::time::advance(Duration::from_millis(50)).await;
        waited.await.unwrap();
    }
}
