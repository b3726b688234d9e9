//! Error types for MIME composition.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Header value would break out of its line.
    #[error("Invalid MIME header {name}: value contains a line break")]
    InvalidHeader {
        /// Header name.
        name: String,
    },

    /// Every generated boundary collided with the body text.
    #[error("Could not find a boundary absent from the message body")]
    BoundaryExhausted,
}
