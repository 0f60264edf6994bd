//! Error types for the transport layer.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while moving bytes to and from a mail server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name cannot be used as a TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Operation exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that was interrupted.
        operation: &'static str,
        /// Configured limit.
        after: Duration,
    },

    /// The caller cancelled the operation.
    #[error("{0} was cancelled")]
    Cancelled(&'static str),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns true if the operation was interrupted by cancellation or timeout.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::Timeout { .. })
    }
}

/// Invalid probe configuration. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Automatic connection type requested on a port with no known default.
    #[error("Port {port} is not a valid {protocol} port when using automatic configuration")]
    UnsupportedAutoPort {
        /// Protocol name (`smtp`, `imap`).
        protocol: &'static str,
        /// Configured port.
        port: u16,
    },

    /// Host is missing.
    #[error("Host must not be empty")]
    MissingHost,

    /// Host contains whitespace or control characters.
    #[error("Invalid host name: {0:?}")]
    InvalidHost(String),

    /// Port is zero.
    #[error("Port must not be zero")]
    MissingPort,
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_port_message() {
        let err = ConfigError::UnsupportedAutoPort {
            protocol: "smtp",
            port: 2525,
        };
        assert_eq!(
            err.to_string(),
            "Port 2525 is not a valid smtp port when using automatic configuration"
        );
    }

    #[test]
    fn test_is_interrupted() {
        assert!(TransportError::Cancelled("connect").is_interrupted());
        assert!(
            TransportError::Timeout {
                operation: "read",
                after: Duration::from_secs(1),
            }
            .is_interrupted()
        );
        assert!(!TransportError::ConnectionClosed.is_interrupted());
    }
}
