//! Connection state machine
//!
//! Single source of truth for the connection lifecycle. The session mutates
//! the state, everything else only reads it; transitions outside the table
//! below are rejected at the call site.
//!
//! ```text
//!  Disconnected ──connect──► Connecting ──alive──► Connected ──teardown──► Disconnected
//!                                │ │ │
//!                 open fail ─────┘ │ └───── superseded ──► Cancelled
//!                 (Error)          └─ deadline ──► Timeout
//!
//!  any state ──new connect request──► Connecting
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of the connection to the hangar unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No active connection, ready to connect
    Disconnected,
    /// Port opening / handshake in progress
    Connecting,
    /// Handshake satisfied, listener loop running
    Connected,
    /// Handshake deadline elapsed with no alive frame
    Timeout,
    /// Port open failed or a non-timeout handshake failure occurred
    Error,
    /// A newer connect request superseded this attempt
    Cancelled,
}

impl ConnectionState {
    /// Wire token for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Validate whether a transition to `new_state` is allowed.
    ///
    /// A fresh connect request always supersedes whatever came before, so
    /// every state may enter `Connecting`. The remaining rows follow the
    /// lifecycle: terminal outcomes are only reachable from `Connecting`,
    /// and a live connection only ends in `Disconnected`.
    pub fn can_transition_to(&self, new_state: ConnectionState) -> bool {
        use ConnectionState::*;

        // A new connect request interrupts anything in flight.
        if new_state == Connecting {
            return true;
        }

        match (self, new_state) {
            (Connecting, Connected) => true,
            (Connecting, Timeout) => true,
            (Connecting, Error) => true,
            (Connecting, Cancelled) => true,
            // Blank port identifier is rejected before the port is touched.
            (Disconnected, Error) => true,
            (Connected, Disconnected) => true,
            // Idempotent teardown.
            (Disconnected, Disconnected) => true,

            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DISCONNECTED" => Ok(Self::Disconnected),
            "CONNECTING" => Ok(Self::Connecting),
            "CONNECTED" => Ok(Self::Connected),
            "TIMEOUT" => Ok(Self::Timeout),
            "ERROR" => Ok(Self::Error),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(ConnectionState::Disconnected.can_transition_to(ConnectionState::Connecting));
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Connected));
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Timeout));
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Error));
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Cancelled));
        assert!(ConnectionState::Connected.can_transition_to(ConnectionState::Disconnected));
    }

    #[test]
    fn test_connect_supersedes_any_state() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Timeout,
            ConnectionState::Error,
            ConnectionState::Cancelled,
        ] {
            assert!(state.can_transition_to(ConnectionState::Connecting));
        }
    }

    #[test]
    fn test_invalid_transitions() {
        // Cannot reach Connected without going through the handshake
        assert!(!ConnectionState::Disconnected.can_transition_to(ConnectionState::Connected));
        // A live connection cannot time out; only the handshake can
        assert!(!ConnectionState::Connected.can_transition_to(ConnectionState::Timeout));
        assert!(!ConnectionState::Timeout.can_transition_to(ConnectionState::Connected));
    }

    #[test]
    fn test_wire_tokens_roundtrip() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Timeout,
            ConnectionState::Error,
            ConnectionState::Cancelled,
        ] {
            assert_eq!(state.as_str().parse::<ConnectionState>(), Ok(state));
        }
        assert_eq!("connected".parse::<ConnectionState>(), Ok(ConnectionState::Connected));
        assert!("FOO".parse::<ConnectionState>().is_err());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&ConnectionState::Connected).unwrap();
        assert_eq!(json, "\"CONNECTED\"");
        let state: ConnectionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, ConnectionState::Connected);
    }
}
