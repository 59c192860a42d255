//! Agent UI WebSocket message shapes.
//!
//! The first client frame is the auth handshake; afterwards clients send
//! room actions and receive acks plus forwarded event envelopes (which the
//! client dispatches on by their `data_type` field).

use serde::{Deserialize, Serialize};

/// First frame from the client: `{"auth": {"token": "<jwt>"}}`.
#[derive(Debug, Deserialize)]
pub struct AuthHandshake {
    pub auth: AuthToken,
}

#[derive(Debug, Deserialize)]
pub struct AuthToken {
    pub token: String,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum UiClientMessage {
    JoinConversation {
        #[serde(rename = "conversationName")]
        conversation_name: String,
    },
    LeaveConversation {
        #[serde(rename = "conversationName")]
        conversation_name: String,
    },
}

/// Ack for a join/leave, carrying the normalized room name.
#[derive(Debug, Serialize)]
pub struct RoomAck<'a> {
    pub event: &'a str,
    pub ok: bool,
    #[serde(rename = "conversationName")]
    pub conversation_name: &'a str,
}

pub fn unauthenticated_event() -> String {
    r#"{"event":"unauthenticated"}"#.to_owned()
}
