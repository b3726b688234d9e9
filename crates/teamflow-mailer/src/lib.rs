//! # teamflow-mailer
//!
//! Transactional email for TeamFlow: invoice notices, team invitations.
//!
//! A caller hands over `{to, subject, html, text?}`; the [`EmailGateway`]
//! loads relay settings, composes a `multipart/alternative` document and
//! drives one implicit-TLS SMTP session to deliver it. Failures come back
//! as a uniform [`SendEmailResponse`] naming the stage, reply code and
//! relay text, so callers can treat delivery as best-effort.
//!
//! ## Modules
//!
//! - [`config`]: relay settings from the environment
//! - [`gateway`]: request/response types and the send pipeline
//! - [`http`]: the axum router exposing `POST /api/send-email`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod gateway;
pub mod http;

pub use config::{ConfigSource, ProcessEnv, RelayConfig};
pub use error::{Error, Result};
pub use gateway::{EmailGateway, FailureDetails, SendEmailRequest, SendEmailResponse};
pub use http::router;
