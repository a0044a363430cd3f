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
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]
#![doc = include_str!("../README.md")]

mod in_memory;

pub use self::in_memory::InMemoryGatewayRateLimiter;

use std::{fmt::Debug, future::Future, pin::Pin};

/// Future returned by [`GatewayRateLimiter::acquire`].
pub type GateFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A concurrency gate admitting up to `rate` holders per `per`-second window.
///
/// This is a capability interface so a distributed coordinator can replace
/// the process-local implementation without touching a [`Shard`]'s or
/// [`GatewayClient`]'s logic.
///
/// [`Shard`]: https://docs.rs/corvid-gateway/latest/corvid_gateway/struct.Shard.html
/// [`GatewayClient`]: https://docs.rs/corvid-gateway/latest/corvid_gateway/struct.GatewayClient.html
pub trait GatewayRateLimiter: Debug + Send + Sync {
    /// Wait for a slot to open, then occupy it.
    ///
    /// The slot is released automatically after this implementation's
    /// configured `per`-second window elapses; there is no explicit release
    /// call, and the caller's own work takes however long it takes.
    fn acquire(&self) -> GateFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::GatewayRateLimiter;
    use static_assertions::assert_obj_safe;

    assert_obj_safe!(GatewayRateLimiter);
}
