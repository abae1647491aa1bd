//! Stored record types. Distinct from the pairchat-types wire models: these hold
//! raw ids only and are resolved into canonical messages on the way out.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use pairchat_types::models::{Attachment, User, VoiceNote};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
}

impl UserRow {
    pub fn new(id: Uuid, username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub reply_to_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub seen_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub attachment: Option<Attachment>,
    pub voice: Option<VoiceNote>,
}

impl MessageRow {
    pub fn is_between(&self, a: Uuid, b: Uuid) -> bool {
        (self.sender_id == a && self.receiver_id == b) || (self.sender_id == b && self.receiver_id == a)
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRow {
    pub user_id: Uuid,
    pub emoji: String,
}
