//! Feedme transport layer
//!
//! The protocol engine is transport-agnostic: anything that can carry framed
//! text messages per connection and report lifecycle events can back a
//! Feedme server. This crate defines the traits the engine consumes plus an
//! in-process channel transport used for embedding and tests.

pub mod channel;
pub mod error;
pub mod traits;

pub use channel::{ChannelEvents, ChannelTransport, ClientConn};
pub use error::{Result, TransportError};
pub use traits::{ConnectionId, Transport, TransportEvent, TransportEvents, TransportState};
