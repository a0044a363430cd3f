//! Callback signatures and the lightweight shard handle passed to them.

use crate::status::ShardStatus;
use std::{future::Future, pin::Pin, sync::Arc};

type CallbackFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Which way a frame crossed the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Received from the gateway.
    Inbound,
    /// Sent to the gateway.
    Outbound,
}

/// Identifies which shard a callback invocation concerns.
///
/// Callbacks receive this instead of a live [`crate::shard::Shard`]
/// reference: the shard's own task owns its mutable state for the
/// single-threaded-per-shard invariant to hold, so external observers get a
/// cheap snapshot of its identity instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ShardInfo {
    id: u64,
    shard_count: u64,
}

impl ShardInfo {
    pub(crate) const fn new(id: u64, shard_count: u64) -> Self {
        Self { id, shard_count }
    }

    /// This shard's id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The total number of shards in this session.
    #[must_use]
    pub const fn shard_count(&self) -> u64 {
        self.shard_count
    }
}

/// Invoked for every inbound and outbound gateway frame, in receive/send
/// order for a given shard.
pub type DispatchCallback =
    Arc<dyn Fn(ShardInfo, Direction, serde_json::Value) -> CallbackFuture + Send + Sync>;

/// Invoked, fire-and-forget, whenever a shard's [`ShardStatus`] changes.
pub type StatusCallback = Arc<dyn Fn(ShardInfo, ShardStatus) -> CallbackFuture + Send + Sync>;
