//! multipart/alternative document builder.

use std::fmt;

use crate::boundary;
use crate::content_type::ContentType;
use crate::encoding::{UTF_8, encode_rfc2047, is_header_safe};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Fresh boundaries tried before giving up on a collision.
const MAX_BOUNDARY_ATTEMPTS: usize = 8;

/// Characters that force a display name into a quoted string.
const SPECIALS: &[char] = &[
    '(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"',
];

/// Mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: String,
}

impl Mailbox {
    /// Creates a mailbox with just an address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    /// Creates a mailbox with a display name and address.
    #[must_use]
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().map(str::trim) {
            None | Some("") => f.write_str(&self.address),
            Some(name) if !is_header_safe(name) => {
                write!(f, "{} <{}>", encode_rfc2047(name, UTF_8), self.address)
            }
            Some(name) if name.contains(SPECIALS) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{}>", self.address)
            }
            Some(name) => write!(f, "{name} <{}>", self.address),
        }
    }
}

/// What goes into one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    /// Author shown in the `From` header.
    pub from: Mailbox,
    /// Recipient shown in the `To` header.
    pub to: String,
    /// Subject line, encoded when not plain ASCII.
    pub subject: String,
    /// HTML rendering, always present.
    pub html: String,
    /// Optional plain-text rendering, placed before the HTML part.
    pub text: Option<String>,
}

/// A composed MIME document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeMessage {
    boundary: String,
    raw: String,
}

impl MimeMessage {
    /// The boundary separating the parts.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The full document.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The full document as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    /// Consumes the message, returning the document.
    #[must_use]
    pub fn into_string(self) -> String {
        self.raw
    }
}

impl fmt::Display for MimeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Renders `content` as a multipart/alternative document with a fresh
/// boundary.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if the recipient or sender address
/// contains a line break.
pub fn compose(content: &EmailContent) -> Result<MimeMessage> {
    compose_with(content, boundary::generate)
}

/// Like [`compose`], drawing boundary candidates from `next_boundary`.
///
/// A candidate that occurs in either body is discarded.
///
/// # Errors
///
/// Returns [`Error::BoundaryExhausted`] if every candidate collides, or
/// [`Error::InvalidHeader`] as for [`compose`].
pub fn compose_with<F>(content: &EmailContent, mut next_boundary: F) -> Result<MimeMessage>
where
    F: FnMut() -> String,
{
    let boundary = (0..MAX_BOUNDARY_ATTEMPTS)
        .map(|_| next_boundary())
        .find(|candidate| !collides(candidate, content))
        .ok_or(Error::BoundaryExhausted)?;

    let mut headers = Headers::new();
    headers.add("From", content.from.to_string())?;
    headers.add("To", content.to.as_str())?;
    headers.add("Subject", encode_rfc2047(&content.subject, UTF_8))?;
    headers.add("MIME-Version", "1.0")?;
    headers.add(
        "Content-Type",
        ContentType::multipart_alternative(boundary.as_str()).to_string(),
    )?;

    let mut raw = headers.to_string();
    raw.push_str("\r\n");
    if let Some(text) = &content.text {
        push_part(&mut raw, &boundary, &ContentType::text_plain(), text);
    }
    push_part(&mut raw, &boundary, &ContentType::text_html(), &content.html);
    raw.push_str("--");
    raw.push_str(&boundary);
    raw.push_str("--\r\n");

    Ok(MimeMessage { boundary, raw })
}

fn collides(boundary: &str, content: &EmailContent) -> bool {
    content.html.contains(boundary)
        || content
            .text
            .as_deref()
            .is_some_and(|text| text.contains(boundary))
}

fn push_part(out: &mut String, boundary: &str, content_type: &ContentType, body: &str) {
    out.push_str("--");
    out.push_str(boundary);
    out.push_str("\r\nContent-Type: ");
    out.push_str(&content_type.to_string());
    out.push_str("\r\n\r\n");
    out.push_str(body);
    out.push_str("\r\n");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn invoice(text: Option<&str>) -> EmailContent {
        EmailContent {
            from: Mailbox::with_name("TeamFlow", "sender@x.com"),
            to: "client@y.com".to_string(),
            subject: "Invoice 1".to_string(),
            html: "<b>Hi</b>".to_string(),
            text: text.map(str::to_string),
        }
    }

    fn fixed(token: &'static str) -> impl FnMut() -> String {
        move || token.to_string()
    }

    #[test]
    fn test_compose_exact_layout() {
        let message = compose_with(&invoice(Some("Hi")), fixed("XYZ")).unwrap();
        assert_eq!(
            message.as_str(),
            "From: TeamFlow <sender@x.com>\r\n\
             To: client@y.com\r\n\
             Subject: Invoice 1\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/alternative; boundary=XYZ\r\n\
             \r\n\
             --XYZ\r\n\
             Content-Type: text/plain; charset=UTF-8\r\n\
             \r\n\
             Hi\r\n\
             --XYZ\r\n\
             Content-Type: text/html; charset=UTF-8\r\n\
             \r\n\
             <b>Hi</b>\r\n\
             --XYZ--\r\n"
        );
        assert_eq!(message.boundary(), "XYZ");
    }

    #[test]
    fn test_compose_html_only() {
        let message = compose_with(&invoice(None), fixed("XYZ")).unwrap();
        assert!(!message.as_str().contains("text/plain"));
        assert_eq!(message.as_str().matches("text/html").count(), 1);
        assert_eq!(message.as_str().matches("--XYZ\r\n").count(), 1);
    }

    #[test]
    fn test_compose_regenerates_colliding_boundary() {
        let mut content = invoice(Some("see --taken-- below"));
        content.html = "<p>taken</p>".to_string();
        let mut candidates = vec!["fresh", "taken"];

        let message = compose_with(&content, || candidates.pop().unwrap().to_string()).unwrap();
        assert_eq!(message.boundary(), "fresh");
    }

    #[test]
    fn test_compose_gives_up_when_every_boundary_collides() {
        let mut content = invoice(None);
        content.html = "XYZ".to_string();
        assert_eq!(
            compose_with(&content, fixed("XYZ")).unwrap_err(),
            Error::BoundaryExhausted
        );
    }

    #[test]
    fn test_compose_encodes_non_ascii_headers() {
        let mut content = invoice(None);
        content.subject = "Facture n°1".to_string();
        content.from = Mailbox::with_name("Équipe", "sender@x.com");

        let message = compose(&content).unwrap();
        assert!(message.as_str().contains("Subject: =?utf-8?B?RmFjdHVyZSBuwrAx?=\r\n"));
        assert!(message.as_str().contains("From: =?utf-8?B?w4lxdWlwZQ==?= <sender@x.com>\r\n"));
    }

    #[test]
    fn test_compose_folds_long_encoded_subject() {
        let mut content = invoice(None);
        content.subject =
            "Facture n°1 pour l'équipe TeamFlow, échéance le 30 novembre".to_string();

        let message = compose_with(&content, fixed("XYZ")).unwrap();
        let (head, _) = message.as_str().split_once("\r\n\r\n").unwrap();
        let subject = head
            .split("\r\n")
            .skip_while(|line| !line.starts_with("Subject: "))
            .take_while(|line| line.starts_with("Subject: ") || line.starts_with(' '))
            .collect::<Vec<_>>();

        assert!(subject.len() > 1);
        for line in subject {
            let word = line.trim_start_matches("Subject: ").trim_start();
            assert!(word.starts_with("=?utf-8?B?") && word.ends_with("?="));
            assert!(word.len() <= 75, "{word} is {} characters", word.len());
        }
    }

    #[test]
    fn test_compose_rejects_header_injection() {
        let mut content = invoice(None);
        content.to = "client@y.com\r\nBcc: victim@z.com".to_string();
        assert!(matches!(
            compose(&content),
            Err(Error::InvalidHeader { name }) if name == "To"
        ));
    }

    #[test]
    fn test_mailbox_rendering() {
        assert_eq!(Mailbox::new("a@b.c").to_string(), "a@b.c");
        assert_eq!(Mailbox::with_name("  ", "a@b.c").to_string(), "a@b.c");
        assert_eq!(
            Mailbox::with_name("Doe, John", "a@b.c").to_string(),
            "\"Doe, John\" <a@b.c>"
        );
        assert_eq!(
            Mailbox::with_name("TeamFlow", "a@b.c").to_string(),
            "TeamFlow <a@b.c>"
        );
    }
}
