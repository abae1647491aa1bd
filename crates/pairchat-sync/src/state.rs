//! Reconciliation of the local conversation view.
//!
//! Two inputs feed the view: periodic full snapshots (authoritative) and push
//! events (low-latency hints). Both go through [`ConversationView::apply`].
//!
//! Merge contract:
//! - `Snapshot` replaces everything; ids missing from it are gone and no older
//!   history remains. Optimistic `seenAt` values survive the replace until the
//!   server reports a real one.
//! - `Created` appends only unknown ids, so a push that races a poll never
//!   duplicates.
//! - `Edited` and `ReactionChanged` replace in place and ignore unknown ids.
//! - `Deleted` removes if present.
//! - `Page` prepends older messages it does not already hold.
//!
//! Push merges never re-sort; arrival order is kept until the next snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use pairchat_types::events::ServerEvent;
use pairchat_types::models::Message;

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Snapshot(Vec<Message>),
    /// A backfill page, oldest-first.
    Page { messages: Vec<Message>, has_more: bool },
    Created(Message),
    Edited(Message),
    ReactionChanged(Message),
    Deleted(Uuid),
    Typing { username: String, is_typing: bool },
}

impl Update {
    /// State-carrying push events. Handshake, error and pong events map to
    /// `None`.
    pub fn from_event(event: ServerEvent) -> Option<Self> {
        match event {
            ServerEvent::NewMessage(message) | ServerEvent::MessageSent(message) => {
                Some(Self::Created(message))
            }
            ServerEvent::MessageEdited(message) => Some(Self::Edited(message)),
            ServerEvent::MessageDeleted { message_id } => Some(Self::Deleted(message_id)),
            ServerEvent::ReactionAdded(message) | ServerEvent::ReactionRemoved(message) => {
                Some(Self::ReactionChanged(message))
            }
            ServerEvent::Typing(status) => Some(Self::Typing {
                username: status.sender_username,
                is_typing: status.is_typing,
            }),
            ServerEvent::Connected { .. }
            | ServerEvent::AuthSuccess { .. }
            | ServerEvent::AuthError { .. }
            | ServerEvent::Error { .. }
            | ServerEvent::Pong => None,
        }
    }
}

/// Optimistic seenAt for an id sent to mark-seen. Dropped once server data
/// carries a non-null seenAt for the message.
#[derive(Debug, Clone, Copy)]
struct PendingSeen {
    at: DateTime<Utc>,
    /// The mark-seen call succeeded, so the value can no longer be reverted.
    accepted: bool,
}

#[derive(Debug, Default)]
pub struct ConversationView {
    messages: Vec<Message>,
    has_more: bool,
    pending_seen: HashMap<Uuid, PendingSeen>,
    typing: Option<String>,
}

impl ConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Whether older history remains on the server, as of the last page.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Offset for the next backfill request.
    pub fn next_offset(&self) -> usize {
        self.messages.len()
    }

    /// Username of the counterpart while they are typing.
    pub fn typing(&self) -> Option<&str> {
        self.typing.as_deref()
    }

    pub fn apply(&mut self, update: Update) {
        match update {
            Update::Snapshot(messages) => self.replace_all(messages),
            Update::Page { messages, has_more } => {
                self.apply_page(messages, has_more);
            }
            Update::Created(message) => {
                if self.position(message.id).is_none() {
                    self.messages.push(message);
                }
            }
            Update::Edited(message) | Update::ReactionChanged(message) => {
                if let Some(pos) = self.position(message.id) {
                    let message = self.with_pending_seen(message);
                    self.messages[pos] = message;
                }
            }
            Update::Deleted(id) => {
                self.messages.retain(|m| m.id != id);
                self.pending_seen.remove(&id);
            }
            Update::Typing { username, is_typing } => {
                self.typing = is_typing.then_some(username);
            }
        }
    }

    /// Prepend a backfill page and return how many of its messages were new.
    pub fn apply_page(&mut self, messages: Vec<Message>, has_more: bool) -> usize {
        self.has_more = has_more;
        let older: Vec<Message> = messages
            .into_iter()
            .filter(|m| self.position(m.id).is_none())
            .collect();
        let added = older.len();
        self.messages.splice(0..0, older);
        added
    }

    /// Mark every unseen message addressed to `local_user` as seen locally and
    /// return their ids for the batch mark-seen call.
    pub fn take_unseen_for(&mut self, local_user: Uuid) -> Vec<Uuid> {
        let now = Utc::now();
        let mut ids = Vec::new();
        for message in &mut self.messages {
            if message.receiver_id == local_user && message.seen_at.is_none() {
                message.seen_at = Some(now);
                self.pending_seen.insert(
                    message.id,
                    PendingSeen {
                        at: now,
                        accepted: false,
                    },
                );
                ids.push(message.id);
            }
        }
        ids
    }

    /// The server accepted the batch. The optimistic values stay in place
    /// until a snapshot or push carries the real seenAt, since a poll issued
    /// before the call may still arrive.
    pub fn confirm_seen(&mut self, ids: &[Uuid]) {
        for id in ids {
            if let Some(pending) = self.pending_seen.get_mut(id) {
                pending.accepted = true;
            }
        }
    }

    /// The batch failed; revert the optimistic values so a later attempt
    /// picks the messages up again.
    pub fn reject_seen(&mut self, ids: &[Uuid]) {
        for id in ids {
            if self.pending_seen.get(id).is_some_and(|p| !p.accepted) {
                self.pending_seen.remove(id);
                if let Some(pos) = self.position(*id) {
                    self.messages[pos].seen_at = None;
                }
            }
        }
    }

    fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.has_more = false;
        self.pending_seen
            .retain(|id, _| self.messages.iter().any(|m| m.id == *id && m.seen_at.is_none()));
        for message in &mut self.messages {
            if let Some(pending) = self.pending_seen.get(&message.id) {
                message.seen_at = Some(pending.at);
            }
        }
    }

    fn with_pending_seen(&mut self, mut message: Message) -> Message {
        if message.seen_at.is_some() {
            self.pending_seen.remove(&message.id);
        } else if let Some(pending) = self.pending_seen.get(&message.id) {
            message.seen_at = Some(pending.at);
        }
        message
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }
}
