//! Health checks for mail servers.
//!
//! Each invocation opens its own session and drops it before returning, so
//! checks share no state and may run concurrently.

mod imap;
mod smtp;

pub use imap::ImapHealthCheck;
pub use smtp::SmtpHealthCheck;
