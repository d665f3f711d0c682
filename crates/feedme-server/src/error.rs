//! Server error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors surfaced to the application embedding the server.
///
/// These are all programmer-facing: client-facing protocol problems never
/// become `Err`s, they are answered over the wire as ViolationResponses.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Bad caller input to a public operation or responder
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation invoked inconsistently with the engine lifecycle
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Response object was already answered
    #[error("already responded")]
    AlreadyResponded,

    /// Response object was already neutralized
    #[error("already neutralized")]
    AlreadyNeutralized,

    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(#[from] feedme_transport::TransportError),
}
