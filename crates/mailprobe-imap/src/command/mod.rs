//! IMAP command builders.

mod tag_generator;

use std::fmt;

use crate::error::{Error, Result};

pub use tag_generator::TagGenerator;

/// IMAP command sent by the probe.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// LOGIN - Plaintext login
    Login {
        /// User name
        username: String,
        /// Password
        password: String,
    },
    /// SELECT - Open a mailbox
    Select {
        /// Mailbox name
        mailbox: String,
    },
    /// LOGOUT - Close the session
    Logout,
}

impl Command {
    /// Serializes the command with its tag.
    ///
    /// Values that fit neither an atom nor a quoted string go out as
    /// synchronizing literals, so the command is split after each `{n}`
    /// marker. Every segment but the last must be answered with a `+`
    /// continuation before the next one is written. The last segment carries
    /// the CRLF terminator.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<String> {
        let mut out = Segments::default();
        out.push_str(tag);
        out.push_str(" ");

        match self {
            Self::StartTls => out.push_str("STARTTLS"),
            Self::Login { username, password } => {
                out.push_str("LOGIN ");
                out.astring(username);
                out.push_str(" ");
                out.astring(password);
            }
            Self::Select { mailbox } => {
                out.push_str("SELECT ");
                out.astring(mailbox);
            }
            Self::Logout => out.push_str("LOGOUT"),
        }

        out.push_str("\r\n");
        out.finish()
    }

    /// Rejects arguments that IMAP cannot carry in any form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if an argument contains a NUL byte.
    pub fn validate(&self) -> Result<()> {
        let has_nul = match self {
            Self::Login { username, password } => username.contains('\0') || password.contains('\0'),
            Self::Select { mailbox } => mailbox.contains('\0'),
            Self::StartTls | Self::Logout => false,
        };
        if has_nul {
            return Err(Error::InvalidArgument(format!(
                "{} arguments must not contain NUL",
                self.name()
            )));
        }
        Ok(())
    }

    /// Command name safe to log.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Logout => "LOGOUT",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Select { mailbox } => f.debug_struct("Select").field("mailbox", mailbox).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Command text split at literal boundaries.
#[derive(Debug, Default)]
struct Segments {
    done: Vec<String>,
    current: String,
}

impl Segments {
    fn push_str(&mut self, s: &str) {
        self.current.push_str(s);
    }

    /// Writes an astring: atom, quoted string, or literal.
    fn astring(&mut self, s: &str) {
        if s.bytes().any(needs_literal) {
            self.current.push_str(&format!("{{{}}}\r\n", s.len()));
            self.done.push(std::mem::take(&mut self.current));
            self.current.push_str(s);
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            self.current.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    self.current.push('\\');
                }
                self.current.push(c);
            }
            self.current.push('"');
        } else {
            self.current.push_str(s);
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.done.push(self.current);
        self.done
    }
}

/// Returns true if the byte cannot appear in a quoted string.
const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\r' | b'\n') || b >= 0x80
}

/// Returns true if the byte cannot appear in an atom.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']')
        || b < 0x20
        || b == 0x7F
}
