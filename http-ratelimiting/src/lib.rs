#![deny(
    clippy::all,
    clippy::missing_const_for_fn,
    clippy::pedantic,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    unsafe_code,
    unused
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::unnecessary_wraps
)]
#![doc = include_str!("../README.md")]

pub mod bucket_lock;
pub mod in_memory;

pub use self::{
    bucket_lock::{BucketLock, InMemoryBucketLock},
    in_memory::InMemoryRateLimiter,
};

use std::{fmt::Debug, future::Future, pin::Pin, sync::Arc, time::Duration};

/// Future returned by [`RateLimiter::acquire`].
pub type AcquireFuture<'a> = Pin<Box<dyn Future<Output = Arc<dyn BucketLock>> + Send + 'a>>;

/// Future returned by [`RateLimiter::lock_globally`].
pub type LockGloballyFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A ratelimiter for the Discord REST API.
///
/// A default, process-local implementation is [`InMemoryRateLimiter`]. This
/// is a capability interface so that a distributed coordinator (a shared
/// counter service, for example) can be substituted without changing any
/// request-sending logic.
///
/// Implementations hold a mapping of bucket key to [`BucketLock`], created
/// lazily, plus one global gate that supersedes every per-bucket lock while
/// it is closed.
pub trait RateLimiter: Debug + Send + Sync {
    /// Wait for the global gate to be open, then return the lock for
    /// `bucket`, creating it if this is the first time it has been seen.
    ///
    /// The returned lock has not been entered; the caller is responsible for
    /// acquiring it before issuing the request it guards.
    fn acquire(&self, bucket: String) -> AcquireFuture<'_>;

    /// Close the global gate, then reopen it after `release_after`.
    ///
    /// Fire-and-forget: the returned future resolves as soon as the closure
    /// has been scheduled, not when the gate reopens. Concurrent calls must
    /// not shorten an already-scheduled reopening.
    fn lock_globally(&self, release_after: Duration) -> LockGloballyFuture<'_>;
}
