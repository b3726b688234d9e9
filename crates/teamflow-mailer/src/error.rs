//! Gateway error types.

use teamflow_smtp::SendFailure;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a send request did not produce an accepted message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required relay settings are missing or unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request itself cannot be turned into a message.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The relay conversation failed.
    #[error(transparent)]
    Delivery(#[from] SendFailure),
}

impl Error {
    /// Name of the step that failed, as reported to callers.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config",
            Self::InvalidRequest(_) => "request",
            Self::Delivery(failure) => failure.stage.as_str(),
        }
    }

    /// SMTP reply code, if the relay refused a command.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Delivery(failure) => failure.error.code(),
            _ => None,
        }
    }

    /// Raw relay text accompanying [`code`](Self::code).
    #[must_use]
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Delivery(failure) => failure.error.server_message(),
            _ => None,
        }
    }
}
