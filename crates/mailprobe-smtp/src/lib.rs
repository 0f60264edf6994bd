//! # mailprobe-smtp
//!
//! The SMTP half of the mail probes. Just enough of RFC 5321 to prove a
//! server is alive and, optionally, that it accepts a set of credentials.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailprobe_smtp::SmtpSession;
//! use mailprobe_transport::{CancellationToken, ConnectionConfig};
//!
//! let config = ConnectionConfig::new("smtp.example.com", 587);
//! let mut session = SmtpSession::new(config, CancellationToken::new())?;
//!
//! if session.connect().await? && session.authenticate("svc", "secret").await? {
//!     println!("SMTP server healthy");
//! }
//! session.quit().await;
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │ Disconnected │ ─── connect() ───→ Connected
//! └──────────────┘
//!        Connected ─── [STARTTLS] ───→ Secured ─── AUTH LOGIN ───→ Authenticated
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builder
//! - [`reply`]: reply framing and acceptance markers
//! - [`session`]: the probe state machine

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod error;
pub mod reply;
pub mod session;

pub use command::Command;
pub use error::{Error, Result};
pub use reply::SmtpReply;
pub use session::{SessionState, SmtpSession, resolve_connection_type};
