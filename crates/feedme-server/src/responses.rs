//! Response objects
//!
//! Every application event that expects an answer carries a response object
//! built on one shared single-fire latch. The application may answer exactly
//! once, whenever it likes; the engine may neutralize the latch when the
//! addressee vanishes (client disconnected, server stopped), turning a
//! later answer into a safe no-op instead of a stray wire message.
//!
//! Neutralization is an engine-only capability: it lives on a separate
//! handle type that is never part of the value given to the application.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::clients::ClientId;
use crate::engine::Engine;
use crate::error::{Result, ServerError};
use feedme_core::{validate, FeedArgs, FeedIdentity, JsonObject};

struct GuardState {
    responded: bool,
    neutralized: bool,
    engine: Option<Arc<Engine>>,
}

/// Single-fire latch shared by all four response kinds.
pub(crate) struct ResponseGuard {
    state: Arc<Mutex<GuardState>>,
}

/// Engine-side handle used to neutralize an outstanding response.
pub(crate) struct Neutralizer {
    state: Arc<Mutex<GuardState>>,
}

impl ResponseGuard {
    pub(crate) fn new(engine: Arc<Engine>) -> (ResponseGuard, Neutralizer) {
        let state = Arc::new(Mutex::new(GuardState {
            responded: false,
            neutralized: false,
            engine: Some(engine),
        }));
        (
            ResponseGuard {
                state: Arc::clone(&state),
            },
            Neutralizer { state },
        )
    }

    /// Flip to responded. `Ok(Some(engine))` means forward the answer;
    /// `Ok(None)` means the latch was neutralized and the answer is a
    /// silent no-op. A second call always fails, neutralized or not.
    fn consume(&self) -> Result<Option<Arc<Engine>>> {
        let mut state = self.state.lock();
        if state.responded {
            return Err(ServerError::AlreadyResponded);
        }
        state.responded = true;
        let engine = state.engine.take();
        if state.neutralized {
            Ok(None)
        } else {
            Ok(engine)
        }
    }
}

impl Neutralizer {
    /// Mark the latch neutralized. Calling after the application already
    /// answered, or neutralizing twice, indicates an engine-side bug and
    /// fails accordingly.
    pub(crate) fn neutralize(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.responded {
            return Err(ServerError::AlreadyResponded);
        }
        if state.neutralized {
            return Err(ServerError::AlreadyNeutralized);
        }
        state.neutralized = true;
        state.engine = None;
        Ok(())
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Handshake event payload.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    pub client: ClientId,
}

/// Action event payload.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub client: ClientId,
    pub action_name: String,
    pub action_args: JsonObject,
}

/// FeedOpen event payload.
#[derive(Debug, Clone)]
pub struct FeedOpenRequest {
    pub client: ClientId,
    pub feed_name: String,
    pub feed_args: FeedArgs,
}

/// FeedClose event payload.
#[derive(Debug, Clone)]
pub struct FeedCloseRequest {
    pub client: ClientId,
    pub feed_name: String,
    pub feed_args: FeedArgs,
}

// ============================================================================
// Responders
// ============================================================================

/// Answers a handshake event. Success only.
pub struct HandshakeResponder {
    pub(crate) guard: ResponseGuard,
    pub(crate) client: ClientId,
}

impl HandshakeResponder {
    pub fn success(&self) -> Result<()> {
        if let Some(engine) = self.guard.consume()? {
            engine.handshake_success(self.client);
        }
        Ok(())
    }
}

/// Answers an action event with data or an error.
pub struct ActionResponder {
    pub(crate) guard: ResponseGuard,
    pub(crate) client: ClientId,
    pub(crate) callback_id: String,
}

impl ActionResponder {
    pub fn success(&self, action_data: Value) -> Result<()> {
        validate::ensure_object("action data", &action_data)
            .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;
        if let Some(engine) = self.guard.consume()? {
            engine.action_result(self.client, self.callback_id.clone(), Ok(action_data));
        }
        Ok(())
    }

    /// Action error codes may be any string, the empty string included.
    /// (Feed-open error codes must be non-empty; the asymmetry is inherited
    /// from the protocol's reference implementation and kept as-is.)
    pub fn failure(&self, error_code: impl Into<String>, error_data: Value) -> Result<()> {
        let error_code = error_code.into();
        if let Some(engine) = self.guard.consume()? {
            engine.action_result(
                self.client,
                self.callback_id.clone(),
                Err((error_code, error_data)),
            );
        }
        Ok(())
    }
}

/// Answers a feed-open event with initial feed data or an error.
pub struct FeedOpenResponder {
    pub(crate) guard: ResponseGuard,
    pub(crate) client: ClientId,
    pub(crate) identity: FeedIdentity,
}

impl FeedOpenResponder {
    pub fn success(&self, feed_data: Value) -> Result<()> {
        validate::ensure_object("feed data", &feed_data)
            .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;
        if let Some(engine) = self.guard.consume()? {
            engine.feed_open_result(self.client, self.identity.clone(), Ok(feed_data));
        }
        Ok(())
    }

    pub fn failure(&self, error_code: impl Into<String>, error_data: Value) -> Result<()> {
        let error_code = error_code.into();
        if error_code.is_empty() {
            return Err(ServerError::InvalidArgument(
                "feed open error code must be non-empty".into(),
            ));
        }
        if let Some(engine) = self.guard.consume()? {
            engine.feed_open_result(
                self.client,
                self.identity.clone(),
                Err((error_code, error_data)),
            );
        }
        Ok(())
    }
}

/// Answers a feed-close event. Success only; a feed close always
/// eventually succeeds.
pub struct FeedCloseResponder {
    pub(crate) guard: ResponseGuard,
    pub(crate) client: ClientId,
    pub(crate) identity: FeedIdentity,
}

impl FeedCloseResponder {
    pub fn success(&self) -> Result<()> {
        if let Some(engine) = self.guard.consume()? {
            engine.feed_close_success(self.client, self.identity.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::engine::Engine;
    use feedme_transport::ChannelTransport;
    use tokio::sync::mpsc;

    fn guard_pair() -> (ResponseGuard, Neutralizer) {
        let (transport, _events) = ChannelTransport::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = Engine::new(ServerConfig::default(), Arc::new(transport), tx);
        ResponseGuard::new(engine)
    }

    #[test]
    fn consume_forwards_once_then_fails() {
        let (guard, _neutralizer) = guard_pair();
        assert!(guard.consume().unwrap().is_some());
        assert!(matches!(guard.consume(), Err(ServerError::AlreadyResponded)));
    }

    #[test]
    fn neutralized_consume_is_a_silent_noop() {
        let (guard, neutralizer) = guard_pair();
        neutralizer.neutralize().unwrap();
        assert!(guard.consume().unwrap().is_none());
        assert!(matches!(guard.consume(), Err(ServerError::AlreadyResponded)));
    }

    #[test]
    fn neutralizing_twice_fails() {
        let (_guard, neutralizer) = guard_pair();
        neutralizer.neutralize().unwrap();
        assert!(matches!(
            neutralizer.neutralize(),
            Err(ServerError::AlreadyNeutralized)
        ));
    }

    #[test]
    fn neutralizing_after_the_answer_fails() {
        let (guard, neutralizer) = guard_pair();
        assert!(guard.consume().unwrap().is_some());
        assert!(matches!(
            neutralizer.neutralize(),
            Err(ServerError::AlreadyResponded)
        ));
    }
}
