use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public projection of a participant. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// A caller that the auth layer has resolved to a known participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
        }
    }
}

/// File attachment metadata. The upload itself happens elsewhere; these
/// fields are stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub size: Option<String>,
}

/// Recorded voice note reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceNote {
    pub url: String,
    pub duration: Option<String>,
}

/// One user's reaction on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    pub user_id: Uuid,
    pub username: String,
}

/// Preview of the message being replied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepliedMessage {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub timestamp: DateTime<Utc>,
}

/// Canonical message: the store's fully resolved view, returned by every
/// query and mutation and carried by every push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub receiver_id: Uuid,
    pub reply_to_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub seen_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub attachment_url: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_type: Option<String>,
    pub attachment_size: Option<String>,
    pub voice_message_url: Option<String>,
    pub voice_message_duration: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replied_message: Option<RepliedMessage>,
}

impl Message {
    pub fn attachment(&self) -> Option<Attachment> {
        self.attachment_url.as_ref().map(|url| Attachment {
            url: url.clone(),
            name: self.attachment_name.clone(),
            content_type: self.attachment_type.clone(),
            size: self.attachment_size.clone(),
        })
    }

    pub fn voice(&self) -> Option<VoiceNote> {
        self.voice_message_url.as_ref().map(|url| VoiceNote {
            url: url.clone(),
            duration: self.voice_message_duration.clone(),
        })
    }

    pub fn is_seen(&self) -> bool {
        self.seen_at.is_some()
    }
}

/// Input to message creation, after the wire request has been unpacked.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub content: String,
    pub receiver_id: Uuid,
    pub reply_to_id: Option<Uuid>,
    pub attachment: Option<Attachment>,
    pub voice: Option<VoiceNote>,
}

/// Transient typing indicator, relayed and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStatus {
    pub sender_username: String,
    pub is_typing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format_is_camel_case() {
        let message = Message {
            id: Uuid::nil(),
            content: "hi".into(),
            sender_id: Uuid::nil(),
            sender_username: "user1".into(),
            receiver_id: Uuid::nil(),
            reply_to_id: None,
            timestamp: DateTime::<Utc>::default(),
            seen_at: None,
            edited_at: None,
            attachment_url: None,
            attachment_name: None,
            attachment_type: None,
            attachment_size: None,
            voice_message_url: None,
            voice_message_duration: None,
            reactions: vec![],
            replied_message: None,
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["senderUsername"], "user1");
        assert!(json["seenAt"].is_null());
        assert!(json["editedAt"].is_null());
        assert_eq!(json["reactions"], serde_json::json!([]));
        assert!(json.get("repliedMessage").is_none());
    }
}
