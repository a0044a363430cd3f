//! A shard's externally observable connection state.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// The connection status of a [`crate::shard::Shard`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ShardStatus {
    /// Constructed but no connection attempt has started yet.
    Pending,
    /// A WebSocket handshake is in progress.
    Connecting,
    /// HELLO was received and IDENTIFY or RESUME was sent.
    Connected,
    /// Reconnecting with an existing session, RESUME sent.
    Resuming,
    /// A critical close code was received; this shard will not reconnect.
    Errored,
    /// The WebSocket is closed and no reconnect is in progress.
    Disconnected,
}

impl Default for ShardStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl Display for ShardStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Pending => "Pending",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Resuming => "Resuming",
            Self::Errored => "Errored",
            Self::Disconnected => "Disconnected",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ShardStatus;

    #[test]
    fn formats_by_name() {
        assert_eq!("Connected", ShardStatus::Connected.to_string());
        assert_eq!("Errored", ShardStatus::Errored.to_string());
    }
}
