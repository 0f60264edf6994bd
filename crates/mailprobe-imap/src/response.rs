//! IMAP reply completion rules and status checks.

use mailprobe_transport::{CompletionRule, Response};

/// Status of a greeting or tagged completion line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed.
    No,
    /// Command was malformed or not valid in this state.
    Bad,
    /// Connection starts already authenticated.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Parses a status keyword, ignoring case.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// Completion rule for the server greeting: the first untagged line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greeting;

impl CompletionRule for Greeting {
    fn is_final(&self, line: &str) -> bool {
        line.starts_with("* ")
    }

    fn keyword<'a>(&self, line: &'a str) -> &'a str {
        second_token(line)
    }
}

/// Completion rule for a tagged command: the line carrying our tag, or an
/// untagged BYE after which nothing more will arrive.
#[derive(Debug, Clone)]
pub struct Tagged<'t> {
    tag: &'t str,
}

impl<'t> Tagged<'t> {
    /// Creates a rule waiting for `tag`.
    #[must_use]
    pub const fn new(tag: &'t str) -> Self {
        Self { tag }
    }

    fn is_tagged(&self, line: &str) -> bool {
        line.strip_prefix(self.tag)
            .is_some_and(|rest| rest.starts_with(' '))
    }
}

impl CompletionRule for Tagged<'_> {
    fn is_final(&self, line: &str) -> bool {
        self.is_tagged(line) || is_untagged_bye(line)
    }

    fn keyword<'a>(&self, line: &'a str) -> &'a str {
        second_token(line)
    }
}

/// Completion rule after a literal marker: the server's `+` go-ahead, or the
/// tagged reply if it refuses the literal.
#[derive(Debug, Clone)]
pub struct Continuation<'t> {
    tagged: Tagged<'t>,
}

impl<'t> Continuation<'t> {
    /// Creates a rule for the command tagged `tag`.
    #[must_use]
    pub const fn new(tag: &'t str) -> Self {
        Self {
            tagged: Tagged::new(tag),
        }
    }
}

impl CompletionRule for Continuation<'_> {
    fn is_final(&self, line: &str) -> bool {
        line.starts_with('+') || self.tagged.is_final(line)
    }

    fn keyword<'a>(&self, line: &'a str) -> &'a str {
        if line.starts_with('+') {
            "+"
        } else {
            second_token(line)
        }
    }
}

/// Returns true if the reply is a continuation request.
#[must_use]
pub fn is_continuation(response: &Response) -> bool {
    response.last_line().starts_with('+')
}

/// Status of a reply read with [`Greeting`] or [`Tagged`].
#[must_use]
pub fn status(response: &Response) -> Option<Status> {
    Status::parse(&response.code_or_keyword)
}

/// Returns true if the greeting accepts the connection (`OK` or `PREAUTH`).
#[must_use]
pub fn is_greeting_accepted(response: &Response) -> bool {
    matches!(status(response), Some(Status::Ok | Status::PreAuth))
}

/// Returns true if the reply ends with `<tag> OK`.
#[must_use]
pub fn is_tagged_ok(response: &Response, tag: &str) -> bool {
    Tagged::new(tag).is_tagged(response.last_line()) && status(response) == Some(Status::Ok)
}

fn is_untagged_bye(line: &str) -> bool {
    line.get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("* BYE "))
}

fn second_token(line: &str) -> &str {
    line.split_whitespace().nth(1).unwrap_or_default()
}
