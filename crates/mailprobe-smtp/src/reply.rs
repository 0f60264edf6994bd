//! SMTP reply framing and the markers the probe looks for.
//!
//! Acceptance is decided by substring containment of a reply code anywhere
//! in the reply text, not by parsing the leading three digits.

use mailprobe_transport::{CompletionRule, Response};

/// 220 Service ready (greeting, STARTTLS may proceed).
pub const SERVICE_READY: &str = "220";
/// 235 Authentication succeeded.
pub const AUTHENTICATION_SUCCEEDED: &str = "235";
/// 250 Requested mail action okay, completed.
pub const ACTION_OK: &str = "250";

/// SMTP completion rule: the last line of a reply has a space after the code.
///
/// Multi-line replies use `-` as separator for continuation lines:
/// `250-First\r\n250-Second\r\n250 Last\r\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpReply;

impl CompletionRule for SmtpReply {
    fn is_final(&self, line: &str) -> bool {
        is_last_reply_line(line)
    }

    fn keyword<'a>(&self, line: &'a str) -> &'a str {
        line.get(..3).unwrap_or(line)
    }
}

/// Checks if a line is the last line of a multi-line reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    match bytes.len() {
        0..=2 => false,
        3 => bytes.iter().all(u8::is_ascii_digit),
        _ => bytes[3] == b' ',
    }
}

/// Returns true if the reply text contains `marker`.
#[must_use]
pub fn is_accepted(response: &Response, marker: &str) -> bool {
    response.contains(marker)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(!is_last_reply_line("25"));
        assert!(!is_last_reply_line("abc"));
    }

    #[test]
    fn test_keyword_is_reply_code() {
        assert_eq!(SmtpReply.keyword("250 smtp.example.com"), "250");
        assert_eq!(SmtpReply.keyword("25"), "25");
    }

    #[test]
    fn test_marker_containment() {
        let response = Response::new(
            "250",
            vec![
                "250-smtp.example.com".to_string(),
                "250-STARTTLS".to_string(),
                "250 AUTH LOGIN PLAIN".to_string(),
            ],
        );
        assert!(is_accepted(&response, ACTION_OK));
        assert!(!is_accepted(&response, AUTHENTICATION_SUCCEEDED));
    }

    #[test]
    fn test_marker_matches_anywhere_in_text() {
        // Substring matching accepts a marker that is not the reply code.
        let response = Response::new("554", vec!["554 rejected, see ticket 2501".to_string()]);
        assert!(is_accepted(&response, ACTION_OK));
    }
}
