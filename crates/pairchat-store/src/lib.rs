pub mod error;
pub mod messages;
pub mod models;
pub mod pagination;
pub mod reactions;
pub mod sanitize;
pub mod users;

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use pairchat_types::models::{Message, Reaction, RepliedMessage};

pub use error::{Result, StoreError};
use models::{MessageRow, ReactionRow, UserRow};

/// Authoritative in-memory state for the one conversation pair.
///
/// Everything sits behind a single coarse lock: each public operation runs its
/// whole read-modify-write inside one `with_state` call, so concurrent
/// handlers only ever observe complete mutations.
pub struct MessageStore {
    state: Mutex<StoreState>,
}

pub(crate) struct StoreState {
    users: Vec<UserRow>,
    /// Creation order, which is also ascending timestamp order.
    messages: Vec<MessageRow>,
    /// message_id -> reactions in insertion order
    reactions: HashMap<Uuid, Vec<ReactionRow>>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MessageStore {
    /// Build the store around the pair. Exactly two users with distinct ids and
    /// usernames are required.
    pub fn new(users: Vec<UserRow>) -> Result<Self> {
        if users.len() != 2 {
            return Err(StoreError::validation(format!(
                "expected exactly 2 users, got {}",
                users.len()
            )));
        }
        if users[0].id == users[1].id || users[0].username == users[1].username {
            return Err(StoreError::validation("users must have distinct ids and usernames"));
        }

        info!(
            "Message store initialized for {} and {}",
            users[0].username, users[1].username
        );

        Ok(Self {
            state: Mutex::new(StoreState {
                users,
                messages: Vec::new(),
                reactions: HashMap::new(),
                last_timestamp: None,
            }),
        })
    }

    pub(crate) fn with_state<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T>,
    {
        let mut state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut state)
    }
}

impl StoreState {
    pub(crate) fn user(&self, id: Uuid) -> Option<&UserRow> {
        self.users.iter().find(|u| u.id == id)
    }

    fn username_of(&self, id: Uuid) -> String {
        self.user(id)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub(crate) fn position(&self, message_id: Uuid) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    pub(crate) fn row(&self, message_id: Uuid) -> Option<&MessageRow> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Strictly increasing creation timestamps, even if the wall clock stalls
    /// or steps backwards.
    pub(crate) fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    /// Resolve a stored row into its canonical form: sender name, reactions
    /// and the reply preview if the target still exists.
    pub(crate) fn canonical(&self, row: &MessageRow) -> Message {
        let reactions = self
            .reactions
            .get(&row.id)
            .map(|rows| {
                rows.iter()
                    .map(|r| Reaction {
                        emoji: r.emoji.clone(),
                        user_id: r.user_id,
                        username: self.username_of(r.user_id),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let replied_message = row
            .reply_to_id
            .and_then(|id| self.row(id))
            .map(|target| RepliedMessage {
                id: target.id,
                content: target.content.clone(),
                sender_id: target.sender_id,
                sender_username: self.username_of(target.sender_id),
                timestamp: target.timestamp,
            });

        let attachment = row.attachment.as_ref();
        let voice = row.voice.as_ref();

        Message {
            id: row.id,
            content: row.content.clone(),
            sender_id: row.sender_id,
            sender_username: self.username_of(row.sender_id),
            receiver_id: row.receiver_id,
            reply_to_id: row.reply_to_id,
            timestamp: row.timestamp,
            seen_at: row.seen_at,
            edited_at: row.edited_at,
            attachment_url: attachment.map(|a| a.url.clone()),
            attachment_name: attachment.and_then(|a| a.name.clone()),
            attachment_type: attachment.and_then(|a| a.content_type.clone()),
            attachment_size: attachment.and_then(|a| a.size.clone()),
            voice_message_url: voice.map(|v| v.url.clone()),
            voice_message_duration: voice.and_then(|v| v.duration.clone()),
            reactions,
            replied_message,
        }
    }

    /// All messages of the pair, ascending.
    pub(crate) fn rows_between(&self, a: Uuid, b: Uuid) -> impl DoubleEndedIterator<Item = &MessageRow> {
        self.messages.iter().filter(move |m| m.is_between(a, b))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn alice() -> Uuid {
        Uuid::from_u128(1)
    }

    pub fn bob() -> Uuid {
        Uuid::from_u128(2)
    }

    pub fn store() -> MessageStore {
        MessageStore::new(vec![
            UserRow::new(alice(), "alice", "unused-hash"),
            UserRow::new(bob(), "bob", "unused-hash"),
        ])
        .unwrap()
    }
}
