//! # mailprobe-transport
//!
//! The network half of the mail probes: a TCP connection that can start in
//! TLS or be upgraded to it in place (STARTTLS), and a command channel that
//! turns "send a line, collect the reply" into one operation.
//!
//! ## Example
//!
//! ```ignore
//! use mailprobe_transport::{
//!     CommandChannel, ConnectionConfig, Connector, IoGuard, TcpConnector,
//! };
//!
//! let config = ConnectionConfig::new("smtp.example.com", 587);
//! let guard = IoGuard::default();
//! let stream = TcpConnector.connect(&config, false, &guard).await?;
//! let mut channel = CommandChannel::new(stream, guard);
//! let greeting = channel.read_line().await?;
//! ```
//!
//! ## Modules
//!
//! - [`channel`]: command/response exchange and reply completion rules
//! - [`config`]: connection settings shared by SMTP and IMAP
//! - [`guard`]: cancellation and deadlines
//! - [`stream`]: plaintext/TLS stream and connectors
//! - [`tls`]: rustls client configuration
//! - `testing`: scripted in-memory transport (`test-util` feature)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
mod error;
pub mod guard;
pub mod stream;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod tls;

pub use channel::{CommandChannel, CompletionRule, Response};
pub use config::{ConnectionConfig, ConnectionConfigBuilder, ConnectionType, Credentials};
pub use error::{ConfigError, Result, TransportError};
pub use guard::IoGuard;
pub use stream::{Connector, MailStream, TcpConnector, Transport};
pub use tokio_util::sync::CancellationToken;
