//! SMTP probe session.
//!
//! ```text
//! Disconnected ── connect() ──→ Connected ── [STARTTLS] ──→ Secured ── AUTH LOGIN ──→ Authenticated
//! ```

use mailprobe_transport::{
    CancellationToken, CommandChannel, ConfigError, ConnectionConfig, ConnectionType, Connector,
    IoGuard, Response, TcpConnector,
};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::reply::{ACTION_OK, AUTHENTICATION_SUCCEEDED, SERVICE_READY, SmtpReply, is_accepted};

/// Resolves `Auto` from the well-known SMTP ports.
///
/// Explicit types are returned unchanged. 465 is implicit TLS, 587 is
/// STARTTLS and 25 is plaintext.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedAutoPort`] for `Auto` on any other port.
pub const fn resolve_connection_type(
    configured: ConnectionType,
    port: u16,
) -> std::result::Result<ConnectionType, ConfigError> {
    match (configured, port) {
        (ConnectionType::Auto, 465) => Ok(ConnectionType::Ssl),
        (ConnectionType::Auto, 587) => Ok(ConnectionType::Tls),
        (ConnectionType::Auto, 25) => Ok(ConnectionType::Plain),
        (ConnectionType::Auto, port) => Err(ConfigError::UnsupportedAutoPort {
            protocol: "smtp",
            port,
        }),
        (explicit, _) => Ok(explicit),
    }
}

/// Where an SMTP session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// Greeting and EHLO exchanged.
    Connected,
    /// Upgraded with STARTTLS.
    Secured,
    /// AUTH LOGIN accepted.
    Authenticated,
}

/// One SMTP probe against one server.
///
/// The session owns its connection; dropping it closes the socket on every
/// path, including errors and cancellation.
#[derive(Debug)]
pub struct SmtpSession<C: Connector = TcpConnector> {
    config: ConnectionConfig,
    connection_type: ConnectionType,
    use_ssl: bool,
    state: SessionState,
    connector: C,
    guard: IoGuard,
    channel: Option<CommandChannel<C::Stream>>,
}

impl SmtpSession<TcpConnector> {
    /// Creates a session that connects over TCP.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `Auto` cannot be resolved for the port.
    pub fn new(config: ConnectionConfig, cancel: CancellationToken) -> Result<Self> {
        Self::with_connector(config, TcpConnector, cancel)
    }
}

impl<C: Connector> SmtpSession<C> {
    /// Creates a session that opens its transport through `connector`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the host or port is invalid, or if
    /// `Auto` cannot be resolved for the port.
    pub fn with_connector(
        config: ConnectionConfig,
        connector: C,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let connection_type = resolve_connection_type(config.connection_type, config.port)?;
        let guard = IoGuard::new(cancel, config.io_timeout);
        Ok(Self {
            connection_type,
            use_ssl: connection_type.is_implicit_tls(),
            state: SessionState::Disconnected,
            connector,
            guard,
            channel: None,
            config,
        })
    }

    /// Resolved (never `Auto`) connection type.
    #[must_use]
    pub const fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// True once the connection is encrypted, from the start or after STARTTLS.
    #[must_use]
    pub const fn use_ssl(&self) -> bool {
        self.use_ssl
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// True if [`authenticate`](Self::authenticate) will issue STARTTLS first.
    #[must_use]
    pub fn should_upgrade(&self) -> bool {
        !self.use_ssl && self.connection_type != ConnectionType::Plain
    }

    /// Opens the transport, reads the greeting and sends EHLO.
    ///
    /// Returns `Ok(false)` if the server's greeting or EHLO reply is not
    /// accepted; the connection is dropped in that case.
    ///
    /// # Errors
    ///
    /// Returns an error on network, TLS, cancellation or timeout failures.
    pub async fn connect(&mut self) -> Result<bool> {
        self.disconnect();

        let host = self.config.host.as_str();
        tracing::debug!(
            host,
            port = self.config.port,
            connection_type = %self.connection_type,
            "connecting to SMTP server"
        );

        let stream = self
            .connector
            .connect(&self.config, self.use_ssl, &self.guard)
            .await?;
        let mut channel = CommandChannel::new(stream, self.guard.clone());

        let greeting = channel.read_response(&SmtpReply).await?;
        if !is_accepted(&greeting, SERVICE_READY) {
            tracing::warn!(host, reply = %greeting.full_text, "SMTP greeting not accepted");
            return Ok(false);
        }

        self.channel = Some(channel);
        let ehlo = self.ehlo();
        let reply = self.execute(&ehlo).await?;
        if !is_accepted(&reply, ACTION_OK) {
            tracing::warn!(host = %self.config.host, reply = %reply.full_text, "EHLO rejected");
            self.disconnect();
            return Ok(false);
        }

        self.state = SessionState::Connected;
        Ok(true)
    }

    /// Upgrades with STARTTLS when required, then runs AUTH LOGIN.
    ///
    /// Returns `Ok(true)` iff the final reply reports authentication success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StartTls`] if the server refuses STARTTLS,
    /// [`Error::InvalidState`] if not connected, and transport errors.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<bool> {
        if self.state != SessionState::Connected {
            return Err(Error::InvalidState(format!(
                "authenticate requires a connected session, state is {:?}",
                self.state
            )));
        }

        if self.should_upgrade() {
            self.upgrade_to_tls().await?;
        }

        // Capabilities are reset after STARTTLS.
        let ehlo = self.ehlo();
        let reply = self.execute(&ehlo).await?;
        if !is_accepted(&reply, ACTION_OK) {
            tracing::debug!(reply = %reply.full_text, "EHLO before AUTH not accepted");
        }

        self.execute(&Command::AuthLogin).await?;
        self.execute(&Command::auth_response(username)).await?;
        let reply = self.execute(&Command::auth_response(password)).await?;

        if is_accepted(&reply, AUTHENTICATION_SUCCEEDED) {
            self.state = SessionState::Authenticated;
            Ok(true)
        } else {
            tracing::warn!(
                host = %self.config.host,
                username,
                reply = %reply.full_text,
                "SMTP authentication rejected"
            );
            Ok(false)
        }
    }

    /// Sends STARTTLS and swaps the plaintext stream for TLS.
    ///
    /// Allowed once, from [`SessionState::Connected`], on a plaintext stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StartTls`] if the server does not answer "220", and
    /// transport errors if the handshake fails. The connection is dropped on
    /// any failure.
    pub async fn upgrade_to_tls(&mut self) -> Result<()> {
        if self.state != SessionState::Connected || self.use_ssl {
            return Err(Error::InvalidState(
                "STARTTLS is only valid once on a connected plaintext session".to_string(),
            ));
        }

        let reply = self.execute(&Command::StartTls).await?;
        if !is_accepted(&reply, SERVICE_READY) {
            self.disconnect();
            return Err(Error::StartTls {
                reply: reply.full_text,
            });
        }

        let channel = self.take_channel()?;
        let upgraded = channel
            .upgrade_to_tls(&self.config.host, self.config.allow_invalid_certificates)
            .await;
        let channel = match upgraded {
            Ok(channel) => channel,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e.into());
            }
        };

        self.channel = Some(channel);
        self.use_ssl = true;
        self.state = SessionState::Secured;
        tracing::debug!(host = %self.config.host, "SMTP connection upgraded with STARTTLS");
        Ok(())
    }

    /// Sends QUIT and closes the connection. Failures are ignored.
    pub async fn quit(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            let _ = channel.execute(&Command::Quit.serialize(), &SmtpReply).await;
            let _ = channel.shutdown().await;
        }
        self.state = SessionState::Disconnected;
    }

    fn ehlo(&self) -> Command {
        Command::Ehlo {
            hostname: self.config.host.clone(),
        }
    }

    async fn execute(&mut self, command: &Command) -> Result<Response> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| Error::InvalidState("not connected".to_string()))?;

        tracing::debug!(command = command.name(), "C:");
        match channel.execute(&command.serialize(), &SmtpReply).await {
            Ok(reply) => {
                tracing::debug!(code = %reply.code_or_keyword, "S:");
                Ok(reply)
            }
            Err(e) => {
                self.disconnect();
                Err(e.into())
            }
        }
    }

    fn take_channel(&mut self) -> Result<CommandChannel<C::Stream>> {
        self.channel
            .take()
            .ok_or_else(|| Error::InvalidState("not connected".to_string()))
    }

    fn disconnect(&mut self) {
        self.channel = None;
        self.state = SessionState::Disconnected;
    }
}
