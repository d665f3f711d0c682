//! Feedme Server
//!
//! Transport-agnostic server engine for the Feedme pub/sub protocol. Wire a
//! [`Server`] to anything implementing the transport traits, register
//! handlers for handshakes, actions and feed opens/closes, and answer each
//! request through its response object whenever ready. The engine enforces
//! the protocol state machines, answers violations diagnostically and keeps
//! feed subscription state for broadcasts and terminations.

pub mod config;
pub mod error;
pub mod events;
pub mod responses;
pub mod server;

mod clients;
mod engine;
mod feeds;
mod timers;

pub use clients::ClientId;
pub use config::ServerConfig;
pub use engine::HANDSHAKE_TIMEOUT_REASON;
pub use error::{Result, ServerError};
pub use events::{ServerEvent, ServerEvents};
pub use responses::{
    ActionRequest, ActionResponder, FeedCloseRequest, FeedCloseResponder, FeedOpenRequest,
    FeedOpenResponder, HandshakeRequest, HandshakeResponder,
};
pub use server::{
    ActionRevelationParams, FeedIntegrity, FeedTerminationParams, Server, TerminationScope,
};
