//! Error types for Feedme core

use thiserror::Error;

/// Result type alias for Feedme core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Feedme core error types
#[derive(Error, Debug)]
pub enum Error {
    /// Message text is not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Message parsed as JSON but violates the message schema
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// Feed name is structurally invalid
    #[error("invalid feed name: {0}")]
    InvalidFeedName(String),

    /// Action name is structurally invalid
    #[error("invalid action name: {0}")]
    InvalidActionName(String),

    /// Feed serial does not decode to a feed identity
    #[error("invalid feed serial: {0}")]
    InvalidSerial(String),

    /// A value that must be a JSON object is not one
    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),

    /// Delta payload is structurally invalid
    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    /// Outbound message could not be encoded
    #[error("encode error: {0}")]
    Encode(String),
}
