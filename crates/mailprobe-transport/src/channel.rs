//! Command/response exchange over a [`Transport`].
//!
//! Both SMTP and IMAP are half-duplex line protocols: the client writes one
//! command and the server answers with one or more CRLF-terminated lines.
//! The protocols differ only in how the last line of a reply is recognised,
//! so that rule is supplied per call as a [`CompletionRule`].

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::guard::IoGuard;
use crate::stream::Transport;
use crate::{Result, TransportError};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Maximum total size of one multi-line reply.
const MAX_RESPONSE_LENGTH: usize = 1024 * 1024;

/// Decides when a multi-line reply is complete.
pub trait CompletionRule {
    /// Returns true if `line` (without CRLF) ends the reply.
    fn is_final(&self, line: &str) -> bool;

    /// Extracts the reply code or status keyword from the final line.
    fn keyword<'a>(&self, line: &'a str) -> &'a str {
        line.split_whitespace().next().unwrap_or_default()
    }
}

/// One logical server reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    /// Reply code (SMTP) or status keyword (IMAP) taken from the final line.
    pub code_or_keyword: String,
    /// All lines joined with CRLF.
    pub full_text: String,
    /// Individual lines without terminators.
    pub lines: Vec<String>,
}

impl Response {
    /// Builds a response from its lines.
    #[must_use]
    pub fn new(code_or_keyword: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            code_or_keyword: code_or_keyword.into(),
            full_text: lines.join("\r\n"),
            lines,
        }
    }

    /// Returns true if the reply text contains `marker` anywhere.
    #[must_use]
    pub fn contains(&self, marker: &str) -> bool {
        self.full_text.contains(marker)
    }

    /// Returns the final line of the reply.
    #[must_use]
    pub fn last_line(&self) -> &str {
        self.lines.last().map_or("", String::as_str)
    }
}

/// Line-oriented command channel owning the server connection.
///
/// Dropping the channel closes the connection.
pub struct CommandChannel<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    guard: IoGuard,
}

impl<S> std::fmt::Debug for CommandChannel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl<S: Transport> CommandChannel<S> {
    /// Creates a channel over an open stream.
    pub fn new(stream: S, guard: IoGuard) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            guard,
        }
    }

    /// Returns true if the underlying stream is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        self.reader.get_ref().is_tls()
    }

    /// Writes `command` and reads the reply it triggers.
    ///
    /// The command must already carry its CRLF terminator.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, EOF, oversized lines or replies,
    /// cancellation or timeout.
    pub async fn execute<R>(&mut self, command: &str, rule: &R) -> Result<Response>
    where
        R: CompletionRule + Sync,
    {
        let guard = self.guard.clone();
        guard
            .run("command", async {
                self.write_inner(command.as_bytes()).await?;
                self.read_response_inner(rule).await
            })
            .await
    }

    /// Reads a reply without sending anything first, e.g. a server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, EOF, oversized lines or replies,
    /// cancellation or timeout.
    pub async fn read_response<R>(&mut self, rule: &R) -> Result<Response>
    where
        R: CompletionRule + Sync,
    {
        let guard = self.guard.clone();
        guard
            .run("read response", self.read_response_inner(rule))
            .await
    }

    /// Reads a single line, without its CRLF terminator.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, EOF, oversized lines or replies,
    /// cancellation or timeout.
    pub async fn read_line(&mut self) -> Result<String> {
        let guard = self.guard.clone();
        guard.run("read line", self.read_line_inner()).await
    }

    /// Writes raw bytes and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, cancellation or timeout.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let guard = self.guard.clone();
        guard.run("write", self.write_inner(data)).await
    }

    /// Replaces the plaintext stream with TLS over the same socket.
    ///
    /// Consumes the channel: on failure the connection is dropped and must
    /// not be used again.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS, if the server sent data
    /// ahead of the handshake, or if the handshake fails.
    pub async fn upgrade_to_tls(self, host: &str, allow_invalid_certificates: bool) -> Result<Self> {
        if self.is_tls() {
            return Err(TransportError::InvalidState(
                "Stream is already TLS".to_string(),
            ));
        }
        if !self.reader.buffer().is_empty() {
            return Err(TransportError::Protocol(
                "unexpected data received before TLS handshake".to_string(),
            ));
        }

        let Self {
            reader,
            write_buffer,
            guard,
        } = self;
        let stream = reader.into_inner();
        let upgraded = guard
            .run(
                "TLS upgrade",
                stream.upgrade_to_tls(host, allow_invalid_certificates),
            )
            .await?;

        tracing::debug!(host, "connection upgraded to TLS");
        Ok(Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, upgraded),
            write_buffer,
            guard,
        })
    }

    /// Shuts down the write half of the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails, is cancelled or times out.
    pub async fn shutdown(mut self) -> Result<()> {
        let guard = self.guard.clone();
        guard
            .run("shutdown", async {
                self.reader.get_mut().shutdown().await?;
                Ok(())
            })
            .await
    }

    async fn read_response_inner<R: CompletionRule>(&mut self, rule: &R) -> Result<Response> {
        let mut lines = Vec::new();
        let mut total = 0;
        loop {
            let line = self.read_line_inner().await?;
            tracing::trace!(line = %line, "S:");
            if line.is_empty() {
                continue;
            }

            total += line.len() + 2;
            if total > MAX_RESPONSE_LENGTH {
                return Err(TransportError::Protocol("response too long".to_string()));
            }

            let is_final = rule.is_final(&line);
            lines.push(line);

            if is_final {
                break;
            }
        }

        let keyword = lines
            .last()
            .map(|line| rule.keyword(line).to_string())
            .unwrap_or_default();
        Ok(Response::new(keyword, lines))
    }

    async fn read_line_inner(&mut self) -> Result<String> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(if line.is_empty() {
                    TransportError::ConnectionClosed
                } else {
                    TransportError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed mid-line",
                    ))
                });
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(TransportError::Protocol("line too long".to_string()));
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > MAX_LINE_LENGTH {
            return Err(TransportError::Protocol("line too long".to_string()));
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    async fn write_inner(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
    use tokio_test::io::{Builder, Mock};

    use super::*;

    /// `tokio_test` mock that reports itself as plaintext and upgrades in place.
    struct MockTransport {
        inner: Mock,
        tls: bool,
    }

    impl MockTransport {
        fn new(inner: Mock) -> Self {
            Self { inner, tls: false }
        }
    }

    impl AsyncRead for MockTransport {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for MockTransport {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    impl Transport for MockTransport {
        fn is_tls(&self) -> bool {
            self.tls
        }

        async fn upgrade_to_tls(mut self, _host: &str, _allow: bool) -> Result<Self> {
            self.tls = true;
            Ok(self)
        }
    }

    struct LastLineStartsWith(&'static str);

    impl CompletionRule for LastLineStartsWith {
        fn is_final(&self, line: &str) -> bool {
            line.starts_with(self.0)
        }
    }

    fn channel(mock: Mock) -> CommandChannel<MockTransport> {
        CommandChannel::new(MockTransport::new(mock), IoGuard::default())
    }

    #[tokio::test]
    async fn test_execute_accumulates_lines() {
        let mock = Builder::new()
            .write(b"PING\r\n")
            .read(b"* one\r\n* two\r\n")
            .read(b"done OK\r\n")
            .build();
        let mut channel = channel(mock);

        let response = channel
            .execute("PING\r\n", &LastLineStartsWith("done"))
            .await
            .unwrap();

        assert_eq!(response.lines, vec!["* one", "* two", "done OK"]);
        assert_eq!(response.code_or_keyword, "done");
        assert_eq!(response.full_text, "* one\r\n* two\r\ndone OK");
        assert!(response.contains("two"));
        assert_eq!(response.last_line(), "done OK");
    }

    #[tokio::test]
    async fn test_read_response_skips_blank_lines() {
        let mock = Builder::new().read(b"\r\n220 ready\r\n").build();
        let mut channel = channel(mock);

        let response = channel
            .read_response(&LastLineStartsWith("220"))
            .await
            .unwrap();
        assert_eq!(response.lines, vec!["220 ready"]);
    }

    #[tokio::test]
    async fn test_read_line_split_reads() {
        let mock = Builder::new().read(b"220 sm").read(b"tp ready\r\n").build();
        let mut channel = channel(mock);

        assert_eq!(channel.read_line().await.unwrap(), "220 smtp ready");
    }

    #[tokio::test]
    async fn test_read_line_bare_lf() {
        let mock = Builder::new().read(b"250 OK\n").build();
        let mut channel = channel(mock);

        assert_eq!(channel.read_line().await.unwrap(), "250 OK");
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let mock = Builder::new().build();
        let mut channel = channel(mock);

        let err = channel.read_line().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut channel = channel(mock);

        let err = channel.read_line().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_response_length_limit() {
        // Every line is short, but the reply never ends.
        let continuation = "250-".to_string() + &"x".repeat(1020) + "\r\n";
        let flood = continuation.repeat(MAX_RESPONSE_LENGTH / continuation.len() + 10);
        let mock = Builder::new().read(flood.as_bytes()).build();
        let mut channel = channel(mock);

        let err = channel
            .read_response(&LastLineStartsWith("250 "))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Protocol(ref msg) if msg == "response too long"));
    }

    #[tokio::test]
    async fn test_write_raw() {
        let mock = Builder::new().write(b"dXNlcg==\r\n").build();
        let mut channel = channel(mock);

        channel.write_raw(b"dXNlcg==\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_upgrade_to_tls() {
        let mock = Builder::new()
            .read(b"220 go ahead\r\n")
            .write(b"EHLO mail\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut channel = channel(mock);
        channel
            .read_response(&LastLineStartsWith("220"))
            .await
            .unwrap();
        assert!(!channel.is_tls());

        let mut channel = channel.upgrade_to_tls("mail", false).await.unwrap();
        assert!(channel.is_tls());

        let response = channel
            .execute("EHLO mail\r\n", &LastLineStartsWith("250"))
            .await
            .unwrap();
        assert_eq!(response.code_or_keyword, "250");
    }

    #[tokio::test]
    async fn test_upgrade_twice_fails() {
        let channel = channel(Builder::new().build());
        let channel = channel.upgrade_to_tls("mail", false).await.unwrap();

        let err = channel.upgrade_to_tls("mail", false).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_upgrade_rejects_buffered_plaintext() {
        let mock = Builder::new()
            .read(b"220 go ahead\r\n250 injected\r\n")
            .build();
        let mut channel = channel(mock);
        channel
            .read_response(&LastLineStartsWith("220"))
            .await
            .unwrap();

        let err = channel.upgrade_to_tls("mail", false).await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn test_default_keyword() {
        let rule = LastLineStartsWith("x");
        assert_eq!(rule.keyword("250 OK"), "250");
        assert_eq!(rule.keyword(""), "");
    }
}
