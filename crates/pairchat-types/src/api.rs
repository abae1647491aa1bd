use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{Attachment, Message, NewMessage, User, VoiceNote};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the push channel handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

// -- Messages --

/// Body of `POST /messages` and of the push channel's `message` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
    pub receiver_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_message_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_message_duration: Option<String>,
}

impl SendMessageRequest {
    pub fn text(receiver_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            receiver_id,
            ..Default::default()
        }
    }
}

impl From<SendMessageRequest> for NewMessage {
    fn from(req: SendMessageRequest) -> Self {
        // Empty URLs count as "no payload".
        let attachment = req
            .attachment_url
            .filter(|url| !url.is_empty())
            .map(|url| Attachment {
                url,
                name: req.attachment_name,
                content_type: req.attachment_type,
                size: req.attachment_size,
            });
        let voice = req
            .voice_message_url
            .filter(|url| !url.is_empty())
            .map(|url| VoiceNote {
                url,
                duration: req.voice_message_duration,
            });

        NewMessage {
            content: req.content,
            receiver_id: req.receiver_id,
            reply_to_id: req.reply_to_id,
            attachment,
            voice,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageResponse {
    pub success: bool,
    pub message_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MarkSeenRequest {
    pub message_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkSeenResponse {
    pub success: bool,
    /// Number of messages that transitioned to seen on this call.
    pub updated: usize,
}

/// Query string of `GET /messages/paginated`. Values that are not
/// non-negative integers read as absent, so the defaults apply.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default, deserialize_with = "lenient_count")]
    pub limit: Option<usize>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub offset: Option<usize>,
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedMessages {
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub limit: usize,
    pub offset: usize,
}

// -- Reactions --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub success: bool,
    pub message: Message,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
