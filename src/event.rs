use serde::{Deserialize, Serialize};

use crate::db::Message;

/// Outbound events pushed to live connections.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    Message {
        id: i64,
        conversation_id: i64,
        sender_id: i64,
        content: String,
        sent_at: i64,
    },
    Typing {
        conversation_id: i64,
        user_id: i64,
        is_typing: bool,
    },
    Presence {
        user_id: i64,
        is_online: bool,
    },
    /// Failure report for an operation issued over the same connection.
    Error {
        message: String,
    },
}

impl From<&Message> for Event {
    fn from(msg: &Message) -> Self {
        Event::Message {
            id: msg.id,
            conversation_id: msg.conversation_id,
            sender_id: msg.sender_id,
            content: msg.content.clone(),
            sent_at: msg.sent_at,
        }
    }
}

/// Inbound frames a client may send over its websocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Send {
        conversation_id: i64,
        content: String,
    },
    Typing {
        conversation_id: i64,
        is_typing: bool,
    },
}
