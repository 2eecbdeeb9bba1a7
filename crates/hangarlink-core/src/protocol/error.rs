//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the hangar unit
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Port unavailable ({port}): {category}")]
    PortUnavailable {
        /// Port identifier as requested by the caller
        port: String,
        /// Human-readable failure category
        category: PortErrorCategory,
    },

    #[error("Serial port is not open")]
    NotOpen,

    #[error("Not connected: cannot send command")]
    NotConnected,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Malformed wire message: {0}")]
    MalformedMessage(String),

    #[error("Peer did not respond in time (alive timeout)")]
    HandshakeTimeout,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Category for a port open/write failure, derived from the driver's
/// error text. The native layer only gives us strings, so categorization
/// is substring matching against the messages the common backends emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortErrorCategory {
    /// Port is held by another process
    Busy,
    /// Device path does not exist or was unplugged
    NotFound,
    /// Insufficient access rights on the device node
    PermissionDenied,
    /// Anything we could not classify
    Other,
}

impl PortErrorCategory {
    /// Classify a driver error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("busy") || lower.contains("in use") {
            Self::Busy
        } else if lower.contains("not found")
            || lower.contains("no such file")
            || lower.contains("no such device")
        {
            Self::NotFound
        } else if lower.contains("permission denied") || lower.contains("access denied") {
            Self::PermissionDenied
        } else {
            Self::Other
        }
    }

    /// Short message suitable for direct display by the presentation layer.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Busy => "Port is already in use by another application",
            Self::NotFound => "Port not found or disconnected",
            Self::PermissionDenied => "Permission denied - check device access rights",
            Self::Other => "Serial port error",
        }
    }
}

impl std::fmt::Display for PortErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_busy() {
        assert_eq!(
            PortErrorCategory::classify("Device or resource busy"),
            PortErrorCategory::Busy
        );
    }

    #[test]
    fn test_classify_not_found() {
        assert_eq!(
            PortErrorCategory::classify("No such file or directory"),
            PortErrorCategory::NotFound
        );
        assert_eq!(
            PortErrorCategory::classify("Port not found"),
            PortErrorCategory::NotFound
        );
    }

    #[test]
    fn test_classify_permission() {
        assert_eq!(
            PortErrorCategory::classify("Permission denied (os error 13)"),
            PortErrorCategory::PermissionDenied
        );
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(
            PortErrorCategory::classify("kaboom"),
            PortErrorCategory::Other
        );
    }

    #[test]
    fn test_error_display_carries_category() {
        let err = ProtocolError::PortUnavailable {
            port: "/dev/ttyACM0".to_string(),
            category: PortErrorCategory::Busy,
        };
        let text = err.to_string();
        assert!(text.contains("/dev/ttyACM0"));
        assert!(text.contains("already in use"));
    }
}
