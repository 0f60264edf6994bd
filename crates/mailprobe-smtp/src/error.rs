//! Error types for SMTP probing.

use mailprobe_transport::{ConfigError, TransportError};

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures of an SMTP session.
///
/// Ordinary negative replies (EHLO or AUTH rejected) are not errors; they are
/// reported as `Ok(false)` by the session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network, TLS, cancellation or timeout failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server refused STARTTLS.
    #[error("Could not upgrade SMTP non SSL connection using STARTTLS handshake: {reply}")]
    StartTls {
        /// Server reply to STARTTLS.
        reply: String,
    },

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns true for configuration errors, which must not be retried.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
