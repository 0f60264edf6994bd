//! Connection configuration types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default TCP connect + TLS handshake limit.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit for a single command round trip.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport security mode for a mail connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Pick a mode from the well-known port. Must be resolved before use.
    #[default]
    Auto,
    /// No encryption. **Not recommended outside test environments.**
    Plain,
    /// TLS from the first byte (implicit TLS).
    Ssl,
    /// Plaintext connect, then upgrade with STARTTLS.
    Tls,
}

impl ConnectionType {
    /// Returns true unless this is [`ConnectionType::Auto`].
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Auto)
    }

    /// Returns true if the socket is wrapped in TLS right after connecting.
    #[must_use]
    pub const fn is_implicit_tls(self) -> bool {
        matches!(self, Self::Ssl)
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "AUTO",
            Self::Plain => "PLAIN",
            Self::Ssl => "SSL",
            Self::Tls => "TLS",
        })
    }
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Configured security mode (may still be `Auto`).
    #[serde(default)]
    pub connection_type: ConnectionType,
    /// Skip certificate validation entirely.
    ///
    /// Meant for test servers with self-signed certificates. Never the default.
    #[serde(default)]
    pub allow_invalid_certificates: bool,
    /// Limit for TCP connect plus any implicit TLS handshake.
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Limit for each command round trip and for the STARTTLS handshake.
    #[serde(default = "default_io_timeout", with = "duration_secs")]
    pub io_timeout: Duration,
}

impl ConnectionConfig {
    /// Creates a configuration with `Auto` security and default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connection_type: ConnectionType::Auto,
            allow_invalid_certificates: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>, port: u16) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: Self::new(host, port),
        }
    }

    /// Checks the fields every probe needs.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is blank or contains whitespace or control
    /// characters, or if the port is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        // The host is echoed into EHLO; a line break would end the command early.
        if self.host.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::MissingPort);
        }
        Ok(())
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Sets the security mode.
    #[must_use]
    pub const fn connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.config.connection_type = connection_type;
        self
    }

    /// Disables certificate validation.
    #[must_use]
    pub const fn allow_invalid_certificates(mut self, allow: bool) -> Self {
        self.config.allow_invalid_certificates = allow;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// Account used to log in.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password. May be empty.
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

const fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

const fn default_io_timeout() -> Duration {
    DEFAULT_IO_TIMEOUT
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
