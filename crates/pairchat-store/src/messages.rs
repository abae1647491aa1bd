use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use pairchat_types::models::{Message, NewMessage};

use crate::models::MessageRow;
use crate::sanitize::strip_scripts;
use crate::{MessageStore, Result, StoreError};

/// Upper bound on message text, in characters.
pub const MAX_CONTENT_CHARS: usize = 1000;

impl MessageStore {
    /// Store a new message from `sender_id`. Content is script-stripped first;
    /// it may only end up blank when an attachment or voice note is attached.
    pub fn create_message(&self, sender_id: Uuid, new: NewMessage) -> Result<Message> {
        let content = strip_scripts(&new.content);
        if content.trim().is_empty() && new.attachment.is_none() && new.voice.is_none() {
            return Err(StoreError::validation("message has no content"));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(StoreError::validation("message content too long"));
        }

        self.with_state(|state| {
            if state.user(sender_id).is_none() {
                return Err(StoreError::validation("unknown sender"));
            }
            if state.user(new.receiver_id).is_none() {
                return Err(StoreError::validation("unknown receiver"));
            }
            if sender_id == new.receiver_id {
                return Err(StoreError::validation("sender and receiver must differ"));
            }
            if let Some(reply_to) = new.reply_to_id {
                if state.row(reply_to).is_none() {
                    return Err(StoreError::validation("reply target not found"));
                }
            }

            let row = MessageRow {
                id: Uuid::new_v4(),
                content,
                sender_id,
                receiver_id: new.receiver_id,
                reply_to_id: new.reply_to_id,
                timestamp: state.next_timestamp(),
                seen_at: None,
                edited_at: None,
                attachment: new.attachment,
                voice: new.voice,
            };
            debug!("Created message {} from {} to {}", row.id, sender_id, row.receiver_id);

            let message = state.canonical(&row);
            state.messages.push(row);
            Ok(message)
        })
    }

    /// Replace the content of a message the requester sent.
    pub fn edit_message(&self, message_id: Uuid, new_content: &str, requester_id: Uuid) -> Result<Message> {
        let content = strip_scripts(new_content);

        self.with_state(|state| {
            let idx = state
                .position(message_id)
                .filter(|&i| state.messages[i].sender_id == requester_id)
                .ok_or(StoreError::NotFoundOrUnauthorized)?;

            if content.trim().is_empty() {
                return Err(StoreError::validation("edited content is empty"));
            }
            if content.chars().count() > MAX_CONTENT_CHARS {
                return Err(StoreError::validation("message content too long"));
            }

            let row = &mut state.messages[idx];
            row.content = content;
            row.edited_at = Some(Utc::now());
            debug!("Edited message {}", message_id);

            Ok(state.canonical(&state.messages[idx]))
        })
    }

    /// Hard-delete a message the requester sent, together with its reactions.
    pub fn delete_message(&self, message_id: Uuid, requester_id: Uuid) -> Result<()> {
        self.with_state(|state| {
            let idx = state
                .position(message_id)
                .filter(|&i| state.messages[i].sender_id == requester_id)
                .ok_or(StoreError::NotFoundOrUnauthorized)?;

            state.messages.remove(idx);
            state.reactions.remove(&message_id);
            debug!("Deleted message {}", message_id);
            Ok(())
        })
    }

    /// Best-effort batch acknowledgement. Ids the requester did not receive, or
    /// that are already seen, are skipped. Returns how many changed.
    pub fn mark_messages_as_seen(&self, message_ids: &[Uuid], requester_id: Uuid) -> Result<usize> {
        self.with_state(|state| {
            let now = Utc::now();
            let mut updated = 0;
            for id in message_ids {
                if let Some(row) = state.messages.iter_mut().find(|m| m.id == *id) {
                    if row.receiver_id == requester_id && row.seen_at.is_none() {
                        row.seen_at = Some(now);
                        updated += 1;
                    }
                }
            }
            if updated > 0 {
                debug!("{} messages marked seen by {}", updated, requester_id);
            }
            Ok(updated)
        })
    }

    pub fn message(&self, message_id: Uuid) -> Result<Option<Message>> {
        self.with_state(|state| Ok(state.row(message_id).map(|row| state.canonical(row))))
    }

    /// Full snapshot of the pair's history, ascending by timestamp.
    pub fn messages_between(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>> {
        self.with_state(|state| Ok(state.rows_between(a, b).map(|row| state.canonical(row)).collect()))
    }
}
