//! Process-local [`GatewayRateLimiter`] implementation.

use crate::{GateFuture, GatewayRateLimiter};
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;

/// [`GatewayRateLimiter`] backed by a counting semaphore.
///
/// Constructed with `(rate, per)`: up to `rate` permits may be held at once,
/// and each permit taken by [`InMemoryGatewayRateLimiter::acquire`] is handed
/// to a detached task that returns it to the semaphore after `per` seconds,
/// independent of how long the caller actually takes.
#[derive(Debug)]
pub struct InMemoryGatewayRateLimiter {
    semaphore: Arc<Semaphore>,
    per: Duration,
}

impl InMemoryGatewayRateLimiter {
    /// Create a gate admitting up to `rate` concurrent holders, each
    /// occupying a slot for `per_seconds`.
    #[must_use]
    pub fn new(rate: usize, per_seconds: u64) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(rate)),
            per: Duration::from_secs(per_seconds),
        }
    }
}

impl GatewayRateLimiter for InMemoryGatewayRateLimiter {
    fn acquire(&self) -> GateFuture<'_> {
        Box::pin(async move {
            let permit = self
                .semaphore
                .acquire()
                .await
                .expect("gateway ratelimiter semaphore is never closed");
            permit.forget();

            let semaphore = Arc::clone(&self.semaphore);
            let per = self.per;

            tokio::spawn(async move {
                tokio::time::sleep(per).await;
                semaphore.add_permits(1);
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryGatewayRateLimiter;
    use crate::GatewayRateLimiter;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, time::Duration};

    assert_impl_all!(InMemoryGatewayRateLimiter: GatewayRateLimiter, Debug, Send, Sync);

    #[tokio::test]
    async fn admits_up_to_rate_without_blocking() {
        let limiter = InMemoryGatewayRateLimiter::new(2, 5);

        let start = tokio::time::Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn exceeding_rate_waits_for_a_released_slot() {
        tokio::time::pause();

        let limiter = InMemoryGatewayRateLimiter::new(1, 1);
        limiter.acquire().await;

        let waiter = tokio::spawn(async move {
            limiter.acquire().await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        tokio::time::advance(Duration::from_secs(1)).await;
        waiter.await.unwrap();
    }
}
