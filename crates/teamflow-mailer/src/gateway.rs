//! Boundary between callers and the SMTP client.
//!
//! The gateway owns configuration and request/response shapes; the
//! protocol itself lives in `teamflow-smtp`.

use serde::{Deserialize, Serialize};
use teamflow_mime::{EmailContent, compose};
use teamflow_smtp::{Address, Connector, Envelope, ImplicitTls, Receipt};
use tracing::{info, warn};

use crate::config::{ConfigSource, ProcessEnv, RelayConfig};
use crate::error::{Error, Result};

/// Inbound send request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendEmailRequest {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Optional plain-text body.
    #[serde(default)]
    pub text: Option<String>,
}

/// Outcome reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendEmailResponse {
    /// Whether the relay accepted the message.
    pub success: bool,
    /// Confirmation text on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error summary on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where and how the send failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FailureDetails>,
}

/// Diagnostic detail for a failed send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetails {
    /// Stage in progress (`config`, `connect`, `greeting`, ..., `recipient`, ...).
    pub stage: String,
    /// Relay reply code, when the relay refused a command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Raw relay text accompanying `code`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl SendEmailResponse {
    /// Success response carrying the relay's acceptance text.
    #[must_use]
    pub fn accepted(receipt: &Receipt) -> Self {
        Self {
            success: true,
            message: Some(format!("Email sent: {}", receipt.reply.message_text())),
            error: None,
            details: None,
        }
    }

    /// Failure response for `error`.
    #[must_use]
    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.to_string()),
            details: Some(FailureDetails {
                stage: error.stage().to_string(),
                code: error.code(),
                reply: error.reply().map(str::to_string),
            }),
        }
    }
}

/// Sends transactional email through the configured relay.
///
/// Each call loads configuration afresh and opens its own session, so
/// concurrent sends share nothing.
#[derive(Debug, Clone)]
pub struct EmailGateway<C = ImplicitTls, S = ProcessEnv> {
    connector: C,
    config: S,
}

impl EmailGateway {
    /// Gateway using implicit TLS and the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ImplicitTls::new(), ProcessEnv)
    }
}

impl<C, S> EmailGateway<C, S>
where
    C: Connector,
    S: ConfigSource,
{
    /// Creates a gateway over `connector`, reading settings from `config`.
    pub const fn new(connector: C, config: S) -> Self {
        Self { connector, config }
    }

    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] before any network activity if
    /// settings are missing, [`Error::InvalidRequest`] if the request cannot
    /// be rendered, or [`Error::Delivery`] if the relay conversation fails.
    pub async fn send(&self, request: &SendEmailRequest) -> Result<Receipt> {
        let config = RelayConfig::load(&self.config)?;

        let to = Address::new(request.to.trim())
            .map_err(|e| Error::InvalidRequest(format!("recipient: {e}")))?;
        let message = compose(&EmailContent {
            from: config.sender(),
            to: to.to_string(),
            subject: request.subject.clone(),
            html: request.html.clone(),
            text: request.text.clone(),
        })
        .map_err(|e| Error::InvalidRequest(e.to_string()))?;

        let envelope = Envelope::new(config.from_email.clone(), to);
        let receipt = teamflow_smtp::send(
            &self.connector,
            config.client_settings(),
            &config.credentials(),
            &envelope,
            message.as_bytes(),
        )
        .await?;

        Ok(receipt)
    }

    /// Delivers one message and maps the outcome to a response.
    pub async fn handle(&self, request: &SendEmailRequest) -> SendEmailResponse {
        match self.send(request).await {
            Ok(receipt) => {
                info!(
                    to = %request.to,
                    subject = %request.subject,
                    reply = %receipt.reply.message_text(),
                    "email sent"
                );
                SendEmailResponse::accepted(&receipt)
            }
            Err(e) => {
                warn!(
                    to = %request.to,
                    stage = e.stage(),
                    code = ?e.code(),
                    error = %e,
                    "email not sent"
                );
                SendEmailResponse::failed(&e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use teamflow_smtp::{Error as SmtpError, SendFailure, Stage};

    use super::*;

    #[test]
    fn request_text_is_optional() {
        let request: SendEmailRequest =
            serde_json::from_str(r#"{"to":"a@b.c","subject":"s","html":"<p>h</p>"}"#).unwrap();
        assert_eq!(request.text, None);
    }

    #[test]
    fn failure_response_carries_stage_and_code() {
        let error = Error::Delivery(SendFailure::new(
            Stage::Recipient,
            SmtpError::rejected(Stage::Recipient, 451, "4.3.0 try later"),
        ));
        let json = serde_json::to_value(SendEmailResponse::failed(&error)).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["details"]["stage"], "recipient");
        assert_eq!(json["details"]["code"], 451);
        assert_eq!(json["details"]["reply"], "4.3.0 try later");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn configuration_failure_has_no_code() {
        let error = Error::Configuration("missing required settings: FROM_EMAIL".into());
        let json = serde_json::to_value(SendEmailResponse::failed(&error)).unwrap();

        assert_eq!(json["details"]["stage"], "config");
        assert!(json["details"].get("code").is_none());
    }
}
