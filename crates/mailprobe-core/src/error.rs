//! Error types for the health checks.

use mailprobe_transport::ConfigError;
use thiserror::Error;

/// Errors that can occur while configuring or running a health check.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid probe configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// SMTP session failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] mailprobe_smtp::Error),

    /// IMAP session failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailprobe_imap::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for configuration errors, which must not be retried.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Smtp(mailprobe_smtp::Error::Config(_))
                | Self::Imap(mailprobe_imap::Error::Config(_))
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
