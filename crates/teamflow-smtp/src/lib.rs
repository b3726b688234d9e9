//! # teamflow-smtp
//!
//! A minimal SMTP submission client for transactional email.
//!
//! ## Features
//!
//! - **Implicit TLS only**: the stream is encrypted before the first
//!   protocol byte (port 465 style)
//! - **Explicit state machine**: every command is guarded by the session
//!   state, so `DATA` can never precede `MAIL FROM`
//! - **Strict lockstep**: one command in flight, each awaiting its reply
//! - **Bounded waits**: connect, per-I/O and whole-session deadlines
//! - **AUTH PLAIN** with an initial response
//!
//! ## Quick Start
//!
//! ```ignore
//! use teamflow_smtp::{Address, ClientSettings, Credentials, Envelope, ImplicitTls, send};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), teamflow_smtp::SendFailure> {
//!     let settings = ClientSettings::new("smtp.gmail.com", 465);
//!     let credentials = Credentials::new("user@example.com", "app-password");
//!     let envelope = Envelope::new(
//!         Address::new("user@example.com").unwrap(),
//!         Address::new("client@example.org").unwrap(),
//!     );
//!
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     let receipt = send(&ImplicitTls::new(), settings, &credentials, &envelope, message).await?;
//!     println!("{}", receipt.reply.message_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ─connect─▶ Connected ─greet─▶ Greeted ─authenticate─▶ Authenticated
//!                                                                        │
//!                         ┌──────────── begin_transaction ───────────────┘
//!                         ▼
//!                   InTransaction ─begin_data─▶ DataMode ─send_message─┐
//!                     ▲  │ add_recipient                              │
//!                     │  └──────┘                                     │
//!                     └───────────────────────────────────────────────┘
//!
//! any state ─close / failure─▶ Closed
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders and DATA framing
//! - [`connection`]: transport, command channel and state machine
//! - [`parser`]: reply parser
//! - [`types`]: core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use connection::{
    ClientSettings, CommandChannel, Connector, Credentials, Envelope, ImplicitTls, Receipt,
    ServerInfo, SessionState, SmtpClient, Timeouts, Transport, send,
};
pub use error::{Error, Result, SendFailure, Stage};
pub use types::{Address, Extension, Reply, ReplyCode};
