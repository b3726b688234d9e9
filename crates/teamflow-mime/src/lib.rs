//! # teamflow-mime
//!
//! Builds the `multipart/alternative` documents TeamFlow sends as
//! transactional email.
//!
//! ## Features
//!
//! - **Fixed header order**: From, To, Subject, MIME-Version, Content-Type
//! - **Two renderings**: optional `text/plain`, then `text/html`
//! - **Fresh boundaries**: unique per call, regenerated on collision
//! - **RFC 2047**: non-ASCII subjects and display names become encoded words
//!
//! Bodies are emitted as raw UTF-8 with no transfer encoding; attachments
//! are not supported.
//!
//! ## Quick Start
//!
//! ```ignore
//! use teamflow_mime::{EmailContent, Mailbox, compose};
//!
//! let message = compose(&EmailContent {
//!     from: Mailbox::with_name("TeamFlow", "noreply@teamflow.dev"),
//!     to: "client@example.org".to_string(),
//!     subject: "Invoice 1".to_string(),
//!     html: "<b>Hi</b>".to_string(),
//!     text: Some("Hi".to_string()),
//! })?;
//!
//! println!("{message}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod composer;
mod content_type;
mod error;
mod header;

pub mod boundary;
pub mod encoding;

pub use composer::{EmailContent, Mailbox, MimeMessage, compose, compose_with};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
