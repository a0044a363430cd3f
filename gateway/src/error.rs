//! Gateway-specific error types.

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// A fatal WebSocket close code: the shard that received it will not
/// reconnect, and the parent [`crate::client::GatewayClient`] must stop
/// starting further shards.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GatewayCriticalError(u16);

impl GatewayCriticalError {
    pub(crate) const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The WebSocket close code the gateway sent.
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.0
    }
}

impl Display for GatewayCriticalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "fatal gateway close code {}", self.0)
    }
}

impl StdError for GatewayCriticalError {}

/// Internal control-flow signal produced by a single connection attempt.
///
/// Never surfaced to callers. [`Signal::Reconnect`] is caught by
/// [`crate::shard::Shard::connect`]'s outer loop and retried with backoff;
/// [`Signal::Critical`] is the only variant that escapes it.
pub(crate) enum Signal {
    /// Reconnect with backoff. `established` reports whether HELLO was
    /// received during the attempt that just ended, which decides whether
    /// backoff resets or keeps growing.
    Reconnect { established: bool },
    Critical(GatewayCriticalError),
}
