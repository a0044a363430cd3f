//! Gateway payload opcodes.

use std::{
    convert::TryFrom,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// An opcode recognized in the gateway's `op` field.
///
/// Only the subset the protocol's core needs to branch on by name is
/// represented here; any other numeric opcode is passed through to the
/// dispatch callback untouched.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum Opcode {
    /// An event, carrying `t` and `s`.
    Dispatch = 0,
    /// Request or response requesting an immediate heartbeat.
    Heartbeat = 1,
    /// Start a new session.
    Identify = 2,
    /// Resume a previous session.
    Resume = 6,
    /// The gateway is asking the client to reconnect and resume.
    Reconnect = 7,
    /// The session has been invalidated; a new one must be started.
    InvalidSession = 9,
    /// Sent immediately after connecting, carrying `heartbeat_interval`.
    Hello = 10,
    /// Acknowledges a previously sent heartbeat.
    HeartbeatAck = 11,
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        })
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            6 => Self::Resume,
            7 => Self::Reconnect,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Opcode;
    use std::convert::TryFrom;

    #[test]
    fn round_trips_known_opcodes() {
        assert_eq!(Opcode::Hello, Opcode::try_from(10).unwrap());
        assert_eq!(Opcode::HeartbeatAck, Opcode::try_from(11).unwrap());
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(Opcode::try_from(200).is_err());
    }
}
