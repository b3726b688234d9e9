//! SMTP session management: transport, command channel, state machine.

mod channel;
mod client;
mod send;
mod transport;

pub use channel::CommandChannel;
pub use client::{ClientSettings, Credentials, SmtpClient};
pub use send::{Envelope, Receipt, send};
pub use transport::{Connector, ImplicitTls, Timeouts, Transport};

use crate::types::Extension;
use std::collections::HashSet;
use std::fmt;

/// Server capabilities from EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Returns advertised authentication mechanisms, if AUTH was listed.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Option<&[String]> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
            _ => None,
        })
    }
}

/// Where a session is in the submission sequence.
///
/// Transitions only move forward; `Closed` is terminal and reachable from
/// every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No transport yet.
    Disconnected,
    /// Transport open, 220 greeting received.
    Connected,
    /// EHLO accepted.
    Greeted,
    /// AUTH accepted.
    Authenticated,
    /// MAIL FROM accepted; recipients may be added.
    InTransaction,
    /// DATA accepted with 354; payload expected.
    DataMode,
    /// Session over.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Greeted => "greeted",
            Self::Authenticated => "authenticated",
            Self::InTransaction => "in-transaction",
            Self::DataMode => "data-mode",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
