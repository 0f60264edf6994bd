//! Cancellation and deadlines for network operations.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{Result, TransportError};

/// Bounds every suspension point of a session.
///
/// An operation finishes, times out, or is abandoned as soon as the token is
/// cancelled, whichever comes first. The pending I/O future is dropped in the
/// last two cases.
#[derive(Debug, Clone)]
pub struct IoGuard {
    cancel: CancellationToken,
    timeout: Duration,
}

impl IoGuard {
    /// Creates a guard with the given token and per-operation limit.
    #[must_use]
    pub const fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    /// Returns the same token with a different limit.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            cancel: self.cancel.clone(),
            timeout,
        }
    }

    /// Runs `op` under this guard.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, [`TransportError::Cancelled`] or
    /// [`TransportError::Timeout`].
    pub async fn run<T, F>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled(operation));
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::debug!(operation, "operation cancelled");
                Err(TransportError::Cancelled(operation))
            }
            result = tokio::time::timeout(self.timeout, op) => {
                result.unwrap_or(Err(TransportError::Timeout {
                    operation,
                    after: self.timeout,
                }))
            }
        }
    }
}

impl Default for IoGuard {
    fn default() -> Self {
        Self::new(CancellationToken::new(), crate::config::DEFAULT_IO_TIMEOUT)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_result_through() {
        let guard = IoGuard::default();
        let value = guard.run("noop", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let guard = IoGuard::new(token, Duration::from_secs(1));

        let err = guard
            .run("connect", std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled("connect")));
    }

    #[tokio::test]
    async fn test_cancel_while_pending() {
        let token = CancellationToken::new();
        let guard = IoGuard::new(token.clone(), Duration::from_secs(3600));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = guard
            .run("read", std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled("read")));
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let guard = IoGuard::new(CancellationToken::new(), Duration::from_secs(5));
        let err = guard
            .run("read", std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Timeout {
                operation: "read",
                ..
            }
        ));
    }
}
