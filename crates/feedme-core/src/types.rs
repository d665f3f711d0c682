//! Wire message types
//!
//! Feedme messages are framed JSON text. Every message carries a
//! `MessageType` discriminator; the remaining field names are fixed by the
//! protocol and must appear on the wire exactly as written here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delta::Delta;
use crate::error::{Error, Result};
use crate::serial::FeedArgs;

/// Action arguments / data are JSON objects.
pub type JsonObject = serde_json::Map<String, Value>;

// ============================================================================
// Client -> server
// ============================================================================

/// A message sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "MessageType")]
pub enum ClientMessage {
    Handshake(HandshakeMessage),
    Action(ActionMessage),
    FeedOpen(FeedOpenMessage),
    FeedClose(FeedCloseMessage),
}

/// Handshake - version negotiation, must be the first message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeMessage {
    #[serde(rename = "Versions")]
    pub versions: Vec<String>,
}

/// Action - request/response invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMessage {
    #[serde(rename = "ActionName")]
    pub action_name: String,
    #[serde(rename = "ActionArgs")]
    pub action_args: JsonObject,
    #[serde(rename = "CallbackId")]
    pub callback_id: String,
}

/// FeedOpen - open a named, parameterized feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedOpenMessage {
    #[serde(rename = "FeedName")]
    pub feed_name: String,
    #[serde(rename = "FeedArgs")]
    pub feed_args: FeedArgs,
}

/// FeedClose - close a previously opened feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCloseMessage {
    #[serde(rename = "FeedName")]
    pub feed_name: String,
    #[serde(rename = "FeedArgs")]
    pub feed_args: FeedArgs,
}

impl ClientMessage {
    /// Parse a raw text frame into a client message.
    ///
    /// Distinguishes the two failure stages the engine cares about:
    /// text that is not JSON at all ([`Error::InvalidJson`]) versus JSON
    /// that violates the message schema ([`Error::SchemaViolation`]).
    /// Server-originated message types arriving from a client fail the
    /// schema stage.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::InvalidJson(e.to_string()))?;
        let msg: ClientMessage =
            serde_json::from_value(value).map_err(|e| Error::SchemaViolation(e.to_string()))?;
        match &msg {
            ClientMessage::Handshake(_) => {}
            ClientMessage::Action(m) => {
                if m.action_name.is_empty() {
                    return Err(Error::SchemaViolation("empty ActionName".into()));
                }
                if m.callback_id.is_empty() {
                    return Err(Error::SchemaViolation("empty CallbackId".into()));
                }
            }
            ClientMessage::FeedOpen(m) => {
                if m.feed_name.is_empty() {
                    return Err(Error::SchemaViolation("empty FeedName".into()));
                }
            }
            ClientMessage::FeedClose(m) => {
                if m.feed_name.is_empty() {
                    return Err(Error::SchemaViolation("empty FeedName".into()));
                }
            }
        }
        Ok(msg)
    }
}

// ============================================================================
// Server -> client
// ============================================================================

/// A message sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "MessageType")]
pub enum ServerMessage {
    HandshakeResponse(HandshakeResponseMessage),
    ActionResponse(ActionResponseMessage),
    FeedOpenResponse(FeedOpenResponseMessage),
    FeedCloseResponse(FeedCloseResponseMessage),
    ActionRevelation(ActionRevelationMessage),
    FeedTermination(FeedTerminationMessage),
    ViolationResponse(ViolationResponseMessage),
}

/// HandshakeResponse - success carries the version and assigned client id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponseMessage {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "ClientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// ActionResponse - answers one Action by CallbackId
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponseMessage {
    #[serde(rename = "CallbackId")]
    pub callback_id: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "ActionData", skip_serializing_if = "Option::is_none")]
    pub action_data: Option<Value>,
    #[serde(rename = "ErrorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(rename = "ErrorData", skip_serializing_if = "Option::is_none")]
    pub error_data: Option<Value>,
}

/// FeedOpenResponse - answers one FeedOpen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedOpenResponseMessage {
    #[serde(rename = "FeedName")]
    pub feed_name: String,
    #[serde(rename = "FeedArgs")]
    pub feed_args: FeedArgs,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "FeedData", skip_serializing_if = "Option::is_none")]
    pub feed_data: Option<Value>,
    #[serde(rename = "ErrorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(rename = "ErrorData", skip_serializing_if = "Option::is_none")]
    pub error_data: Option<Value>,
}

/// FeedCloseResponse - always success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCloseResponseMessage {
    #[serde(rename = "FeedName")]
    pub feed_name: String,
    #[serde(rename = "FeedArgs")]
    pub feed_args: FeedArgs,
}

/// ActionRevelation - broadcast of an action's effect on a feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRevelationMessage {
    #[serde(rename = "ActionName")]
    pub action_name: String,
    #[serde(rename = "ActionData")]
    pub action_data: Value,
    #[serde(rename = "FeedName")]
    pub feed_name: String,
    #[serde(rename = "FeedArgs")]
    pub feed_args: FeedArgs,
    #[serde(rename = "FeedDeltas")]
    pub feed_deltas: Vec<Delta>,
    #[serde(rename = "FeedMd5", skip_serializing_if = "Option::is_none")]
    pub feed_md5: Option<String>,
}

/// FeedTermination - server-initiated forced feed closure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedTerminationMessage {
    #[serde(rename = "FeedName")]
    pub feed_name: String,
    #[serde(rename = "FeedArgs")]
    pub feed_args: FeedArgs,
    #[serde(rename = "ErrorCode")]
    pub error_code: String,
    #[serde(rename = "ErrorData")]
    pub error_data: Value,
}

/// ViolationResponse - diagnostic reply to malformed or unexpected traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationResponseMessage {
    #[serde(rename = "Diagnostics")]
    pub diagnostics: Diagnostics,
}

/// Diagnostics carried by a ViolationResponse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(rename = "Problem")]
    pub problem: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl ServerMessage {
    /// Encode to a wire text frame.
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Encode(e.to_string()))
    }

    /// Success HandshakeResponse with the assigned client id.
    pub fn handshake_success(version: &str, client_id: String) -> Self {
        ServerMessage::HandshakeResponse(HandshakeResponseMessage {
            success: true,
            version: Some(version.to_string()),
            client_id: Some(client_id),
        })
    }

    /// Failure HandshakeResponse (no compatible version).
    pub fn handshake_failure() -> Self {
        ServerMessage::HandshakeResponse(HandshakeResponseMessage {
            success: false,
            version: None,
            client_id: None,
        })
    }

    pub fn action_success(callback_id: String, action_data: Value) -> Self {
        ServerMessage::ActionResponse(ActionResponseMessage {
            callback_id,
            success: true,
            action_data: Some(action_data),
            error_code: None,
            error_data: None,
        })
    }

    pub fn action_failure(callback_id: String, error_code: String, error_data: Value) -> Self {
        ServerMessage::ActionResponse(ActionResponseMessage {
            callback_id,
            success: false,
            action_data: None,
            error_code: Some(error_code),
            error_data: Some(error_data),
        })
    }

    pub fn feed_open_success(feed_name: String, feed_args: FeedArgs, feed_data: Value) -> Self {
        ServerMessage::FeedOpenResponse(FeedOpenResponseMessage {
            feed_name,
            feed_args,
            success: true,
            feed_data: Some(feed_data),
            error_code: None,
            error_data: None,
        })
    }

    pub fn feed_open_failure(
        feed_name: String,
        feed_args: FeedArgs,
        error_code: String,
        error_data: Value,
    ) -> Self {
        ServerMessage::FeedOpenResponse(FeedOpenResponseMessage {
            feed_name,
            feed_args,
            success: false,
            feed_data: None,
            error_code: Some(error_code),
            error_data: Some(error_data),
        })
    }

    pub fn feed_close_response(feed_name: String, feed_args: FeedArgs) -> Self {
        ServerMessage::FeedCloseResponse(FeedCloseResponseMessage {
            feed_name,
            feed_args,
        })
    }

    pub fn violation(problem: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::ViolationResponse(ViolationResponseMessage {
            diagnostics: Diagnostics {
                problem: problem.into(),
                message: message.into(),
            },
        })
    }
}
