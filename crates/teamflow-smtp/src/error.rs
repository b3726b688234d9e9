//! Error types for SMTP operations.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::connection::SessionState;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// TCP connect or TLS handshake did not complete.
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O error on an established session.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An I/O wait exceeded its time budget.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The relay closed the stream before a reply was complete.
    #[error("Connection closed by relay")]
    ConnectionClosed,

    /// Missing or non-220 greeting.
    #[error("Bad greeting {code}: {message}")]
    Greeting {
        /// Reply code received instead of 220.
        code: u16,
        /// Raw server text.
        message: String,
    },

    /// Credentials refused.
    #[error("Authentication failed {code}: {message}")]
    Authentication {
        /// Reply code (usually 535).
        code: u16,
        /// Raw server text.
        message: String,
    },

    /// Recipient refused by the relay.
    #[error("Recipient rejected {code}: {message}")]
    RecipientRejected {
        /// Reply code (e.g. 550, 451).
        code: u16,
        /// Raw server text.
        message: String,
    },

    /// Reply code outside the expected class for the issued command.
    #[error("Unexpected reply {code} during {stage}: {message}")]
    Protocol {
        /// Stage that issued the command.
        stage: Stage,
        /// Reply code received.
        code: u16,
        /// Raw server text.
        message: String,
    },

    /// Server output that is not a well-formed reply.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Operation not permitted in the current session state.
    #[error("{operation} not permitted in state {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// Message exceeds the size the relay advertised.
    #[error("Message of {size} bytes exceeds relay limit of {limit} bytes")]
    MessageTooLarge {
        /// Payload size.
        size: usize,
        /// Advertised SIZE limit.
        limit: usize,
    },
}

impl Error {
    /// Builds the error for a refused reply at the given stage.
    #[must_use]
    pub fn rejected(stage: Stage, code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match stage {
            Stage::Greeting => Self::Greeting { code, message },
            Stage::Auth => Self::Authentication { code, message },
            Stage::Recipient => Self::RecipientRejected { code, message },
            _ => Self::Protocol {
                stage,
                code,
                message,
            },
        }
    }

    /// Returns the server reply code carried by this error, if any.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Greeting { code, .. }
            | Self::Authentication { code, .. }
            | Self::RecipientRejected { code, .. }
            | Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the raw server text carried by this error, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Greeting { message, .. }
            | Self::Authentication { message, .. }
            | Self::RecipientRejected { message, .. }
            | Self::Protocol { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.code(), Some(code) if code >= 500 && code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.code(), Some(code) if code >= 400 && code < 500)
    }

    /// Returns true if the underlying stream can no longer carry commands.
    #[must_use]
    pub const fn is_fatal_io(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Io(_)
                | Self::Timeout(_)
                | Self::ConnectionClosed
                | Self::MalformedReply(_)
        )
    }
}

/// Step of the submission sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// TCP connect and TLS handshake.
    Connect,
    /// Waiting for the 220 greeting.
    Greeting,
    /// `EHLO`.
    Ehlo,
    /// `AUTH PLAIN`.
    Auth,
    /// `MAIL FROM`.
    MailFrom,
    /// `RCPT TO`.
    Recipient,
    /// `DATA`.
    Data,
    /// Payload transfer and the reply after the terminating dot.
    Message,
    /// `QUIT`.
    Quit,
}

impl Stage {
    /// Returns the stage name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::Ehlo => "ehlo",
            Self::Auth => "auth",
            Self::MailFrom => "mail_from",
            Self::Recipient => "recipient",
            Self::Data => "data",
            Self::Message => "message",
            Self::Quit => "quit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed submission: the stage in progress and what went wrong.
#[derive(Debug, thiserror::Error)]
#[error("SMTP send failed during {stage}: {error}")]
pub struct SendFailure {
    /// Stage that was in progress.
    pub stage: Stage,
    /// Underlying error.
    #[source]
    pub error: Error,
}

impl SendFailure {
    /// Creates a failure record.
    #[must_use]
    pub const fn new(stage: Stage, error: Error) -> Self {
        Self { stage, error }
    }
}
