//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Operation not valid in the current lifecycle state
    #[error("invalid transport state: {0}")]
    InvalidState(String),

    /// Referenced connection does not exist (or is already closed)
    #[error("connection {0} is not connected")]
    NotConnected(u64),

    /// Transport has shut down
    #[error("transport closed")]
    Closed,
}
