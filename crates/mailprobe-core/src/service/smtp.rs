//! SMTP health check.

use mailprobe_smtp::{SmtpSession, resolve_connection_type};
use mailprobe_transport::{CancellationToken, Connector, TcpConnector};

use crate::Result;
use crate::health::{HealthCheck, HealthCheckContext, HealthCheckResult};
use crate::options::SmtpHealthCheckOptions;

/// Checks that an SMTP server greets, accepts EHLO and, when an account is
/// configured, accepts AUTH LOGIN.
#[derive(Debug, Clone)]
pub struct SmtpHealthCheck<C = TcpConnector> {
    options: SmtpHealthCheckOptions,
    connector: C,
}

impl SmtpHealthCheck<TcpConnector> {
    /// Creates a check that connects over TCP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the host is blank,
    /// the port is zero, or `Auto` cannot be resolved for the port.
    pub fn new(options: SmtpHealthCheckOptions) -> Result<Self> {
        Self::with_connector(options, TcpConnector)
    }
}

impl<C: Connector + Clone> SmtpHealthCheck<C> {
    /// Creates a check that opens its transports through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the host is blank,
    /// the port is zero, or `Auto` cannot be resolved for the port.
    pub fn with_connector(options: SmtpHealthCheckOptions, connector: C) -> Result<Self> {
        options.connection.validate()?;
        resolve_connection_type(options.connection.connection_type, options.connection.port)?;
        Ok(Self { options, connector })
    }

    /// Options this check was built with.
    #[must_use]
    pub const fn options(&self) -> &SmtpHealthCheckOptions {
        &self.options
    }

    /// Runs the probe; `Ok(Some(reason))` is a negative protocol outcome.
    async fn probe(&self, cancel: CancellationToken) -> Result<Option<String>> {
        let connection = &self.options.connection;
        let mut session =
            SmtpSession::with_connector(connection.clone(), self.connector.clone(), cancel)?;

        if !session.connect().await? {
            return Ok(Some(format!(
                "Could not connect to smtp server {}:{} - SSL : {}",
                connection.host, connection.port, connection.connection_type
            )));
        }

        if let Some(account) = &self.options.account
            && !session
                .authenticate(&account.username, &account.password)
                .await?
        {
            session.quit().await;
            return Ok(Some(format!(
                "Error login to smtp server {}:{} with configured credentials",
                connection.host, connection.port
            )));
        }

        session.quit().await;
        Ok(None)
    }
}

impl<C: Connector + Clone> HealthCheck for SmtpHealthCheck<C> {
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
            "SMTP health check finished"
        );
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailprobe_transport::{ConfigError, ConnectionConfig};

    use crate::Error;

    #[test]
    fn test_new_rejects_blank_host() {
        let options = SmtpHealthCheckOptions::new(ConnectionConfig::new("  ", 25));
        let err = SmtpHealthCheck::new(options).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingHost)));
    }

    #[test]
    fn test_new_rejects_zero_port() {
        let options = SmtpHealthCheckOptions::new(ConnectionConfig::new("smtp.example.com", 0));
        let err = SmtpHealthCheck::new(options).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingPort)));
    }

    #[test]
    fn test_new_rejects_unresolvable_auto() {
        let options = SmtpHealthCheckOptions::new(ConnectionConfig::new("smtp.example.com", 2525));
        let err = SmtpHealthCheck::new(options).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("2525"));
    }
}
