//! Scripted in-memory transport for exercising sessions without a server.
//!
//! Enabled with the `test-util` feature.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::ConnectionConfig;
use crate::guard::IoGuard;
use crate::stream::{Connector, Transport};
use crate::{Result, TransportError};

/// Observations shared between a test and the streams it hands out.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog {
    sent: Arc<Mutex<Vec<u8>>>,
    sent_at_upgrade: Arc<Mutex<Option<usize>>>,
    connects: Arc<AtomicUsize>,
    implicit_tls: Arc<AtomicBool>,
    upgraded: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl ScriptLog {
    /// Everything the client wrote, as text.
    #[must_use]
    pub fn sent(&self) -> String {
        let sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&sent).into_owned()
    }

    /// Lines the client wrote, without terminators.
    #[must_use]
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent().lines().map(str::to_string).collect()
    }

    /// Lines the client wrote before the TLS upgrade, if one happened.
    #[must_use]
    pub fn sent_before_upgrade(&self) -> Option<Vec<String>> {
        let at = (*self
            .sent_at_upgrade
            .lock()
            .unwrap_or_else(PoisonError::into_inner))?;
        let sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        Some(
            String::from_utf8_lossy(&sent[..at])
                .lines()
                .map(str::to_string)
                .collect(),
        )
    }

    /// Number of connections opened.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// True if the last connection was opened with implicit TLS.
    #[must_use]
    pub fn implicit_tls(&self) -> bool {
        self.implicit_tls.load(Ordering::SeqCst)
    }

    /// True if a STARTTLS upgrade was performed.
    #[must_use]
    pub fn upgraded(&self) -> bool {
        self.upgraded.load(Ordering::SeqCst)
    }

    /// True once the stream has been dropped.
    #[must_use]
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// In-memory stream that replays server lines one read at a time.
#[derive(Debug)]
pub struct ScriptedStream {
    replies: Cursor<Vec<u8>>,
    hang_when_exhausted: bool,
    tls: bool,
    log: ScriptLog,
}

impl ScriptedStream {
    /// Creates a stream that replays `replies` and then reports EOF.
    #[must_use]
    pub fn new(replies: &[u8], log: ScriptLog) -> Self {
        Self {
            replies: Cursor::new(replies.to_vec()),
            hang_when_exhausted: false,
            tls: false,
            log,
        }
    }

    /// Never completes reads once the script is exhausted.
    #[must_use]
    pub fn hang_when_exhausted(mut self) -> Self {
        self.hang_when_exhausted = true;
        self
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.log.released.store(true, Ordering::SeqCst);
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        #[allow(clippy::cast_possible_truncation)]
        let pos = self.replies.position() as usize;
        let data = self.replies.get_ref();

        if pos >= data.len() {
            if self.hang_when_exhausted {
                return Poll::Pending;
            }
            return Poll::Ready(Ok(()));
        }

        // One line per read so nothing is buffered past a STARTTLS reply.
        let remaining = &data[pos..];
        let line_len = remaining
            .iter()
            .position(|&b| b == b'\n')
            .map_or(remaining.len(), |i| i + 1);
        let to_read = line_len.min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.replies.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.log
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Transport for ScriptedStream {
    fn is_tls(&self) -> bool {
        self.tls
    }

    async fn upgrade_to_tls(mut self, _host: &str, _allow_invalid: bool) -> Result<Self> {
        if self.tls {
            return Err(TransportError::InvalidState(
                "Stream is already TLS".to_string(),
            ));
        }
        let sent_len = self
            .log
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        *self
            .log
            .sent_at_upgrade
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sent_len);
        self.log.upgraded.store(true, Ordering::SeqCst);
        self.tls = true;
        Ok(self)
    }
}

/// Connector handing out a [`ScriptedStream`] per connection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    replies: Vec<u8>,
    hang_when_exhausted: bool,
    refuse: bool,
    log: ScriptLog,
}

impl ScriptedConnector {
    /// Creates a connector whose streams replay `replies`.
    #[must_use]
    pub fn new(replies: impl AsRef<[u8]>) -> Self {
        Self {
            replies: replies.as_ref().to_vec(),
            ..Self::default()
        }
    }

    /// Creates a connector whose connections are refused.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Streams never complete reads once the script is exhausted.
    #[must_use]
    pub fn hang_when_exhausted(mut self) -> Self {
        self.hang_when_exhausted = true;
        self
    }

    /// Returns the shared log.
    #[must_use]
    pub fn log(&self) -> ScriptLog {
        self.log.clone()
    }
}

impl Connector for ScriptedConnector {
    type Stream = ScriptedStream;

    async fn connect(
        &self,
        _config: &ConnectionConfig,
        use_ssl: bool,
        guard: &IoGuard,
    ) -> Result<ScriptedStream> {
        guard
            .run("connect", async {
                if self.refuse {
                    return Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    )));
                }
                self.log.connects.fetch_add(1, Ordering::SeqCst);
                self.log.implicit_tls.store(use_ssl, Ordering::SeqCst);

                let mut stream = ScriptedStream::new(&self.replies, self.log.clone());
                stream.tls = use_ssl;
                if self.hang_when_exhausted {
                    stream = stream.hang_when_exhausted();
                }
                Ok(stream)
            })
            .await
    }
}
