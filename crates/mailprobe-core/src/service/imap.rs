//! IMAP health check.

use mailprobe_imap::{ImapSession, resolve_connection_type};
use mailprobe_transport::{CancellationToken, Connector, Credentials, TcpConnector};

use crate::Result;
use crate::health::{HealthCheck, HealthCheckContext, HealthCheckResult};
use crate::options::ImapHealthCheckOptions;

/// Checks that an IMAP server greets and, when an account is configured,
/// accepts LOGIN and optionally SELECT on a folder.
#[derive(Debug, Clone)]
pub struct ImapHealthCheck<C = TcpConnector> {
    options: ImapHealthCheckOptions,
    connector: C,
}

impl ImapHealthCheck<TcpConnector> {
    /// Creates a check that connects over TCP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the host is blank,
    /// the port is zero, or `Auto` cannot be resolved for the port.
    pub fn new(options: ImapHealthCheckOptions) -> Result<Self> {
        Self::with_connector(options, TcpConnector)
    }
}

impl<C: Connector + Clone> ImapHealthCheck<C> {
    /// Creates a check that opens its transports through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the host is blank,
    /// the port is zero, or `Auto` cannot be resolved for the port.
    pub fn with_connector(options: ImapHealthCheckOptions, connector: C) -> Result<Self> {
        options.connection.validate()?;
        resolve_connection_type(options.connection.connection_type, options.connection.port)?;
        Ok(Self { options, connector })
    }

    /// Options this check was built with.
    #[must_use]
    pub const fn options(&self) -> &ImapHealthCheckOptions {
        &self.options
    }

    /// Runs the probe; `Ok(Some(reason))` is a negative protocol outcome.
    async fn probe(&self, cancel: CancellationToken) -> Result<Option<String>> {
        let connection = &self.options.connection;
        let mut session =
            ImapSession::with_connector(connection.clone(), self.connector.clone(), cancel)?;

        if !session.connect().await? {
            return Ok(Some(format!(
                "Connection to server {} has failed - SSL Enabled : {}",
                connection.host, connection.connection_type
            )));
        }

        let outcome = match &self.options.account {
            Some(account) => self.authenticated_probe(&mut session, account).await?,
            None => None,
        };

        session.logout().await;
        Ok(outcome)
    }

    async fn authenticated_probe(
        &self,
        session: &mut ImapSession<C>,
        account: &Credentials,
    ) -> Result<Option<String>> {
        if !session
            .authenticate(&account.username, &account.password)
            .await?
        {
            return Ok(Some(format!(
                "Login on server {} failed with configured user",
                self.options.connection.host
            )));
        }

        let folder = &self.options.folder;
        if folder.check_folder && !session.select_folder(&folder.folder_name).await? {
            return Ok(Some(format!(
                "Folder {} check failed.",
                folder.folder_name
            )));
        }

        Ok(None)
    }
}

impl<C: Connector + Clone> HealthCheck for ImapHealthCheck<C> {
    async fn check_health(
        &self,
        context: &HealthCheckContext,
        cancel: CancellationToken,
    ) -> HealthCheckResult {
        let result = match self.probe(cancel).await {
            Ok(None) => HealthCheckResult::healthy(),
            Ok(Some(reason)) => HealthCheckResult::failure(context.failure_status, reason),
            Err(e) => HealthCheckResult::from_error(context.failure_status, e),
        };

        tracing::info!(
            check = %context.name,
            host = %self.options.connection.host,
            status = %result.status,
            description = result.description.as_deref().unwrap_or_default(),
            "IMAP health check finished"
        );
        result
    }
}
