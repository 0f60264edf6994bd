//! IMAP probe session.
//!
//! ```text
//! Disconnected ── connect() ──→ Connected ── LOGIN ──→ Authenticated ── SELECT ──→ FolderSelected
//! ```

use mailprobe_transport::{
    CancellationToken, CommandChannel, ConfigError, ConnectionConfig, ConnectionType, Connector,
    IoGuard, Response, TcpConnector, Transport, TransportError,
};

use crate::command::{Command, TagGenerator};
use crate::error::{Error, Result};
use crate::response::{
    Continuation, Greeting, Status, Tagged, is_continuation, is_greeting_accepted, is_tagged_ok,
    status,
};

/// Resolves `Auto` from the well-known IMAP ports.
///
/// Explicit types are returned unchanged. 993 is implicit TLS and 143 is
/// upgraded with STARTTLS.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedAutoPort`] for `Auto` on any other port.
pub const fn resolve_connection_type(
    configured: ConnectionType,
    port: u16,
) -> std::result::Result<ConnectionType, ConfigError> {
    match (configured, port) {
        (ConnectionType::Auto, 993) => Ok(ConnectionType::Ssl),
        (ConnectionType::Auto, 143) => Ok(ConnectionType::Tls),
        (ConnectionType::Auto, port) => Err(ConfigError::UnsupportedAutoPort {
            protocol: "imap",
            port,
        }),
        (explicit, _) => Ok(explicit),
    }
}

/// Where an IMAP session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// Greeting accepted (and STARTTLS done, if required).
    Connected,
    /// LOGIN accepted, or the server greeted with PREAUTH.
    Authenticated,
    /// A mailbox is selected.
    FolderSelected,
}

/// One IMAP probe against one server.
///
/// The session owns its connection; dropping it closes the socket.
#[derive(Debug)]
pub struct ImapSession<C: Connector = TcpConnector> {
    config: ConnectionConfig,
    connection_type: ConnectionType,
    state: SessionState,
    connector: C,
    guard: IoGuard,
    tags: TagGenerator,
    channel: Option<CommandChannel<C::Stream>>,
}

impl ImapSession<TcpConnector> {
    /// Creates a session that connects over TCP.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `Auto` cannot be resolved for the port.
    pub fn new(config: ConnectionConfig, cancel: CancellationToken) -> Result<Self> {
        Self::with_connector(config, TcpConnector, cancel)
    }
}

impl<C: Connector> ImapSession<C> {
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
            state: SessionState::Disconnected,
            connector,
            guard,
            tags: TagGenerator::default(),
            channel: None,
            config,
        })
    }

    /// Resolved (never `Auto`) connection type.
    #[must_use]
    pub const fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// True if the open connection is encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.channel.as_ref().is_some_and(CommandChannel::is_tls)
    }

    /// Opens the transport and reads the greeting, upgrading with STARTTLS
    /// when the connection type asks for it.
    ///
    /// Returns `Ok(false)` if the greeting is neither `OK` nor `PREAUTH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StartTls`] if the server refuses STARTTLS, and
    /// network, TLS, cancellation or timeout failures.
    pub async fn connect(&mut self) -> Result<bool> {
        self.disconnect();

        let host = self.config.host.as_str();
        tracing::debug!(
            host,
            port = self.config.port,
            connection_type = %self.connection_type,
            "connecting to IMAP server"
        );

        let use_ssl = self.connection_type.is_implicit_tls();
        let stream = self
            .connector
            .connect(&self.config, use_ssl, &self.guard)
            .await?;
        let mut channel = CommandChannel::new(stream, self.guard.clone());

        let greeting = channel.read_response(&Greeting).await?;
        if !is_greeting_accepted(&greeting) {
            tracing::warn!(host, reply = %greeting.full_text, "IMAP greeting not accepted");
            return Ok(false);
        }
        let preauth = status(&greeting) == Some(Status::PreAuth);

        self.channel = Some(channel);
        self.state = SessionState::Connected;

        if self.connection_type == ConnectionType::Tls {
            self.start_tls().await?;
        }

        if preauth {
            self.state = SessionState::Authenticated;
        }
        Ok(true)
    }

    /// Sends LOGIN with the given credentials.
    ///
    /// Returns `Ok(true)` iff the server answers with a tagged OK. A session
    /// that was pre-authenticated by the greeting returns `Ok(true)` without
    /// sending anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if not connected, and transport errors.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<bool> {
        match self.state {
            SessionState::Connected => {}
            SessionState::Authenticated => return Ok(true),
            state => {
                return Err(Error::InvalidState(format!(
                    "authenticate requires a connected session, state is {state:?}"
                )));
            }
        }

        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        let (tag, reply) = self.execute(&command).await?;

        if is_tagged_ok(&reply, &tag) {
            self.state = SessionState::Authenticated;
            Ok(true)
        } else {
            tracing::warn!(
                host = %self.config.host,
                username,
                reply = %reply.last_line(),
                "IMAP login rejected"
            );
            Ok(false)
        }
    }

    /// Selects `mailbox`.
    ///
    /// Returns `Ok(true)` iff the server answers with a tagged OK. A failed
    /// SELECT leaves the session authenticated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] before authentication, and transport errors.
    pub async fn select_folder(&mut self, mailbox: &str) -> Result<bool> {
        if !matches!(
            self.state,
            SessionState::Authenticated | SessionState::FolderSelected
        ) {
            return Err(Error::InvalidState(format!(
                "SELECT requires an authenticated session, state is {:?}",
                self.state
            )));
        }

        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        let (tag, reply) = self.execute(&command).await?;

        if is_tagged_ok(&reply, &tag) {
            self.state = SessionState::FolderSelected;
            Ok(true)
        } else {
            tracing::warn!(
                host = %self.config.host,
                mailbox,
                reply = %reply.last_line(),
                "IMAP folder selection failed"
            );
            self.state = SessionState::Authenticated;
            Ok(false)
        }
    }

    /// Sends LOGOUT and closes the connection. Failures are ignored.
    pub async fn logout(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            let tag = self.tags.next();
            let _ = channel
                .execute(&Command::Logout.serialize(&tag).concat(), &Tagged::new(&tag))
                .await;
            let _ = channel.shutdown().await;
        }
        self.state = SessionState::Disconnected;
    }

    async fn start_tls(&mut self) -> Result<()> {
        let (tag, reply) = self.execute(&Command::StartTls).await?;
        if !is_tagged_ok(&reply, &tag) {
            self.disconnect();
            return Err(Error::StartTls {
                reply: reply.full_text,
            });
        }

        let channel = self
            .channel
            .take()
            .ok_or_else(|| Error::InvalidState("not connected".to_string()))?;
        let upgraded = channel
            .upgrade_to_tls(&self.config.host, self.config.allow_invalid_certificates)
            .await;
        match upgraded {
            Ok(channel) => {
                self.channel = Some(channel);
                tracing::debug!(host = %self.config.host, "IMAP connection upgraded with STARTTLS");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(e.into())
            }
        }
    }

    async fn execute(&mut self, command: &Command) -> Result<(String, Response)> {
        command.validate()?;
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| Error::InvalidState("not connected".to_string()))?;

        let tag = self.tags.next();
        tracing::debug!(tag = %tag, command = command.name(), "C:");
        match send_segments(channel, &command.serialize(&tag), &tag).await {
            Ok(reply) => {
                tracing::debug!(tag = %tag, status = %reply.code_or_keyword, "S:");
                Ok((tag, reply))
            }
            Err(e) => {
                self.disconnect();
                Err(e.into())
            }
        }
    }

    fn disconnect(&mut self) {
        self.channel = None;
        self.state = SessionState::Disconnected;
    }
}

/// Writes a serialized command, waiting for a `+` after every literal marker.
///
/// A tagged reply in place of the `+` means the server refused the literal;
/// it is returned as the command's reply.
async fn send_segments<S: Transport>(
    channel: &mut CommandChannel<S>,
    segments: &[String],
    tag: &str,
) -> std::result::Result<Response, TransportError> {
    let Some((last, literals)) = segments.split_last() else {
        return Err(TransportError::InvalidState("empty command".to_string()));
    };
    for segment in literals {
        let reply = channel.execute(segment, &Continuation::new(tag)).await?;
        if !is_continuation(&reply) {
            return Ok(reply);
        }
    }
    channel.execute(last, &Tagged::new(tag)).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_auto_resolution() {
        assert_eq!(
            resolve_connection_type(ConnectionType::Auto, 993),
            Ok(ConnectionType::Ssl)
        );
        assert_eq!(
            resolve_connection_type(ConnectionType::Auto, 143),
            Ok(ConnectionType::Tls)
        );
    }

    #[test]
    fn test_auto_on_unknown_port_is_config_error() {
        let err = resolve_connection_type(ConnectionType::Auto, 1143).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedAutoPort {
                protocol: "imap",
                port: 1143
            }
        );
        assert!(err.to_string().contains("1143"));
    }

    #[test]
    fn test_new_rejects_unresolvable_auto() {
        let config = ConnectionConfig::new("imap.example.com", 25);
        let err = ImapSession::new(config, CancellationToken::new()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let config = ConnectionConfig::new("imap.example.com", 993);
        let session = ImapSession::new(config, CancellationToken::new()).unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.connection_type(), ConnectionType::Ssl);
        assert!(!session.is_tls());
    }

    proptest! {
        #[test]
        fn auto_resolves_only_well_known_ports(port in any::<u16>()) {
            let resolved = resolve_connection_type(ConnectionType::Auto, port);
            prop_assert_eq!(resolved.is_ok(), matches!(port, 143 | 993));
        }

        #[test]
        fn explicit_plain_is_kept(port in any::<u16>()) {
            prop_assert_eq!(
                resolve_connection_type(ConnectionType::Plain, port),
                Ok(ConnectionType::Plain)
            );
        }
    }
}
