use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::SendMessageRequest;
use crate::models::{Message, TypingStatus};

/// Category carried by an `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Command needs an authenticated connection.
    Auth,
    /// Frame could not be decoded.
    Channel,
    Validation,
    /// Missing message, or one the caller does not own.
    NotFound,
    Internal,
}

/// Events sent over the push channel, server to client.
/// Wire form: `{"type": "<snake_case>", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Sent once, right after the socket opens.
    Connected { message: String },

    AuthSuccess { user_id: Uuid, username: String },

    AuthError { message: String },

    /// A message from the counterpart.
    NewMessage(Message),

    /// Confirmation of a message sent on this connection.
    MessageSent(Message),

    MessageEdited(Message),

    MessageDeleted { message_id: Uuid },

    ReactionAdded(Message),

    ReactionRemoved(Message),

    Typing(TypingStatus),

    Error { kind: ErrorKind, message: String },

    Pong,
}

impl ServerEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::AuthSuccess { .. } => "auth_success",
            Self::AuthError { .. } => "auth_error",
            Self::NewMessage(_) => "new_message",
            Self::MessageSent(_) => "message_sent",
            Self::MessageEdited(_) => "message_edited",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::ReactionAdded(_) => "reaction_added",
            Self::ReactionRemoved(_) => "reaction_removed",
            Self::Typing(_) => "typing",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
        }
    }
}

/// Commands sent over the push channel, client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    /// Bind this connection to the identity behind the token.
    Auth { token: String },

    Message(SendMessageRequest),

    EditMessage { message_id: Uuid, content: String },

    DeleteMessage { message_id: Uuid },

    AddReaction { message_id: Uuid, emoji: String },

    RemoveReaction { message_id: Uuid, emoji: String },

    /// `receiver_id` is accepted for compatibility; the counterpart is
    /// always derived from the authenticated identity.
    Typing {
        is_typing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiver_id: Option<Uuid>,
    },

    Ping,
}
