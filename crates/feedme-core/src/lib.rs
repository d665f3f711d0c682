//! Feedme Core
//!
//! Core types and protocol primitives for the Feedme pub/sub protocol.
//!
//! This crate provides:
//! - Wire message types and client-message parsing ([`ClientMessage`], [`ServerMessage`])
//! - Canonical feed identity ([`FeedIdentity`], [`FeedSerial`])
//! - Feed delta payload types ([`Delta`])
//! - Validation helpers and the feed-data integrity hash

pub mod delta;
pub mod error;
pub mod hash;
pub mod serial;
pub mod types;
pub mod validate;

pub use delta::{Delta, PathElement};
pub use error::{Error, Result};
pub use hash::feed_data_hash;
pub use serial::{FeedArgs, FeedIdentity, FeedSerial};
pub use types::*;

/// Feedme specification version spoken by this implementation.
pub const FEEDME_VERSION: &str = "0.8";
