//! # mailprobe-imap
//!
//! The IMAP half of the mail probes: greeting, optional STARTTLS, LOGIN and
//! an optional SELECT. Nothing here fetches or parses mail.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailprobe_imap::ImapSession;
//! use mailprobe_transport::{CancellationToken, ConnectionConfig};
//!
//! let config = ConnectionConfig::new("imap.example.com", 993);
//! let mut session = ImapSession::new(config, CancellationToken::new())?;
//!
//! if session.connect().await?
//!     && session.authenticate("svc", "secret").await?
//!     && session.select_folder("INBOX").await?
//! {
//!     println!("IMAP server healthy");
//! }
//! session.logout().await;
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │ Disconnected │ ─── connect() ───→ Connected
//! └──────────────┘
//!        Connected ─── LOGIN ───→ Authenticated ─── SELECT ───→ FolderSelected
//! ```
//!
//! ## Modules
//!
//! - [`command`]: command serialization and tags
//! - [`response`]: greeting and tagged completion rules
//! - [`session`]: the probe state machine

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod error;
pub mod response;
pub mod session;

pub use command::{Command, TagGenerator};
pub use error::{Error, Result};
pub use response::{Continuation, Greeting, Status, Tagged};
pub use session::{ImapSession, SessionState, resolve_connection_type};
