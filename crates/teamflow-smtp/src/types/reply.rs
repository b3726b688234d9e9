//! SMTP reply types.

use std::fmt;

/// A complete, possibly multi-line, reply from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Code shared by every line.
    pub code: ReplyCode,
    /// Text of each reply line, code and separator stripped.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true if the reply spanned more than one line.
    #[must_use]
    pub fn is_multiline(&self) -> bool {
        self.lines.len() > 1
    }

    /// Returns true if the code is one of `accepted`.
    #[must_use]
    pub fn is_any_of(&self, accepted: &[ReplyCode]) -> bool {
        accepted.contains(&self.code)
    }

    /// Reply text with lines joined by `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// `220` greeting.
    pub const SERVICE_READY: Self = Self(220);
    /// `235` after a successful `AUTH`.
    pub const AUTH_SUCCESS: Self = Self(235);
    /// `250` completed.
    pub const OK: Self = Self(250);
    /// `251` recipient will be forwarded.
    pub const FORWARD: Self = Self(251);
    /// `354` go ahead with the message body.
    pub const START_DATA: Self = Self(354);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
