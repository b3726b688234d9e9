//! SMTP command builder.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::types::Address;

/// SMTP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// AUTH PLAIN with an initial response
    AuthPlain {
        /// Base64 of `\0username\0password`
        initial_response: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Builds `AUTH PLAIN` from credentials (RFC 4616 message, no authzid).
    #[must_use]
    pub fn auth_plain(username: &str, password: &str) -> Self {
        let message = format!("\0{username}\0{password}");
        Self::AuthPlain {
            initial_response: STANDARD.encode(message.as_bytes()),
        }
    }

    /// Returns the command line without CRLF, with credentials masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::AuthPlain { .. } => "AUTH PLAIN ****".to_string(),
            _ => {
                let mut line = String::from_utf8_lossy(&self.serialize()).into_owned();
                line.truncate(line.len() - 2);
                line
            }
        }
    }

    /// Serializes the command to bytes, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::AuthPlain { initial_response } => {
                buf.extend_from_slice(b"AUTH PLAIN ");
                buf.extend_from_slice(initial_response.as_bytes());
            }
            Self::MailFrom { from } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Frames a message for transmission after `354`.
///
/// Bare LF becomes CRLF, lines starting with `.` are dot-stuffed, and the
/// terminating `.` line is appended so the payload always ends in
/// `CRLF . CRLF`.
#[must_use]
pub fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);
    let mut line_start = true;
    let mut previous = 0u8;

    for &byte in message {
        match byte {
            b'\n' => {
                if previous != b'\r' {
                    out.push(b'\r');
                }
                out.push(b'\n');
                line_start = true;
            }
            b'.' if line_start => {
                out.extend_from_slice(b"..");
                line_start = false;
            }
            _ => {
                out.push(byte);
                line_start = false;
            }
        }
        previous = byte;
    }

    if !out.is_empty() && !out.ends_with(b"\r\n") {
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b".\r\n");
    out
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}
