//! Error types for IMAP probing.

use mailprobe_transport::{ConfigError, TransportError};
use thiserror::Error;

/// Hard failures of an IMAP session.
///
/// A rejected greeting, LOGIN or SELECT is not an error; the session reports
/// those as `Ok(false)`.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network, TLS, cancellation or timeout failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server refused STARTTLS.
    #[error("Could not upgrade IMAP non SSL connection using STARTTLS: {reply}")]
    StartTls {
        /// Server reply to STARTTLS.
        reply: String,
    },

    /// An argument cannot be encoded in an IMAP command.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns true for configuration errors, which must not be retried.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
