//! Stream types for mail connections.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::config::ConnectionConfig;
use crate::guard::IoGuard;
use crate::tls::{create_tls_connector, server_name};
use crate::{Result, TransportError};

/// A byte stream to a mail server that can be switched to TLS in place.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + Sized {
    /// Returns true if the stream is TLS-encrypted.
    fn is_tls(&self) -> bool;

    /// Wraps the current plaintext stream in TLS without reconnecting.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS or the handshake fails.
    fn upgrade_to_tls(
        self,
        host: &str,
        allow_invalid_certificates: bool,
    ) -> impl Future<Output = Result<Self>> + Send;
}

/// Opens transports.
pub trait Connector: Send + Sync {
    /// Stream produced by this connector.
    type Stream: Transport;

    /// Opens a connection, performing the TLS handshake first when `use_ssl` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails, is cancelled, or times out.
    fn connect(
        &self,
        config: &ConnectionConfig,
        use_ssl: bool,
        guard: &IoGuard,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum MailStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport for MailStream {
    fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    async fn upgrade_to_tls(self, host: &str, allow_invalid_certificates: bool) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let tls = handshake(tcp, host, allow_invalid_certificates).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(TransportError::InvalidState(
                "Stream is already TLS".to_string(),
            )),
        }
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Connects over TCP, optionally with implicit TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = MailStream;

    async fn connect(
        &self,
        config: &ConnectionConfig,
        use_ssl: bool,
        guard: &IoGuard,
    ) -> Result<MailStream> {
        let guard = guard.with_timeout(config.connect_timeout);
        let host = config.host.as_str();
        let port = config.port;

        guard
            .run("connect", async {
                let tcp = TcpStream::connect((host, port)).await?;
                tracing::debug!(host, port, use_ssl, "TCP connection established");

                if use_ssl {
                    let tls = handshake(tcp, host, config.allow_invalid_certificates).await?;
                    Ok(MailStream::Tls(Box::new(tls)))
                } else {
                    Ok(MailStream::Plain(tcp))
                }
            })
            .await
    }
}

async fn handshake(
    tcp: TcpStream,
    host: &str,
    allow_invalid_certificates: bool,
) -> Result<TlsStream<TcpStream>> {
    let connector = create_tls_connector(allow_invalid_certificates)?;
    let name = server_name(host)?;
    let tls = connector.connect(name, tcp).await?;
    tracing::debug!(host, "TLS handshake complete");
    Ok(tls)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    use super::*;

    #[tokio::test]
    async fn test_plain_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let config = ConnectionConfig::new("127.0.0.1", port);
        let stream = TcpConnector
            .connect(&config, false, &IoGuard::default())
            .await
            .unwrap();

        assert!(!stream.is_tls());
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ConnectionConfig::new("127.0.0.1", port);
        let err = TcpConnector
            .connect(&config, false, &IoGuard::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn test_connect_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let guard = IoGuard::new(token, Duration::from_secs(1));

        let config = ConnectionConfig::new("127.0.0.1", 25);
        let err = TcpConnector
            .connect(&config, false, &guard)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled("connect")));
    }
}
