//! SMTP command builder.

use std::fmt;

use base64::Engine;

/// SMTP command sent by the probe.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Name announced to the server
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH LOGIN - Begin LOGIN authentication
    AuthLogin,
    /// One base64 line of the LOGIN exchange
    AuthResponse {
        /// Already-encoded username or password
        encoded: String,
    },
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Builds the LOGIN response line for a username or password.
    ///
    /// An empty value encodes to an empty line.
    #[must_use]
    pub fn auth_response(value: &str) -> Self {
        Self::AuthResponse {
            encoded: encode_base64(value),
        }
    }

    /// Serializes the command, including the CRLF terminator.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut buf = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::AuthLogin => "AUTH LOGIN".to_string(),
            Self::AuthResponse { encoded } => encoded.clone(),
            Self::Quit => "QUIT".to_string(),
        };
        buf.push_str("\r\n");
        buf
    }

    /// Command name safe to log.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::AuthLogin => "AUTH LOGIN",
            Self::AuthResponse { .. } => "<auth response>",
            Self::Quit => "QUIT",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ehlo { hostname } => f.debug_struct("Ehlo").field("hostname", hostname).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Standard base64 of the UTF-8 bytes of `text`.
#[must_use]
pub fn encode_base64(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "smtp.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), "EHLO smtp.example.com\r\n");
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.serialize(), "STARTTLS\r\n");
    }

    #[test]
    fn test_auth_login_command() {
        assert_eq!(Command::AuthLogin.serialize(), "AUTH LOGIN\r\n");
    }

    #[test]
    fn test_auth_response_encodes_base64() {
        assert_eq!(Command::auth_response("svc").serialize(), "c3Zj\r\n");
        assert_eq!(
            Command::auth_response("pässword").serialize(),
            "cMOkc3N3b3Jk\r\n"
        );
    }

    #[test]
    fn test_empty_password_is_empty_line() {
        assert_eq!(Command::auth_response("").serialize(), "\r\n");
    }

    #[test]
    fn test_quit_command() {
        assert_eq!(Command::Quit.serialize(), "QUIT\r\n");
    }

    #[test]
    fn test_debug_hides_credentials() {
        let cmd = Command::auth_response("secret");
        assert_eq!(format!("{cmd:?}"), "<auth response>");
        assert_eq!(cmd.name(), "<auth response>");
    }
}
