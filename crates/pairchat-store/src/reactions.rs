use tracing::debug;
use uuid::Uuid;

use pairchat_types::models::Message;

use crate::models::ReactionRow;
use crate::{MessageStore, Result, StoreError};

/// Distinct emoji one user may hold on a single message.
pub const MAX_REACTIONS_PER_USER: usize = 2;

/// Longest accepted emoji sequence, in characters.
pub const MAX_EMOJI_CHARS: usize = 10;

fn validate_emoji(emoji: &str) -> Result<()> {
    let len = emoji.chars().count();
    if emoji.trim().is_empty() || len > MAX_EMOJI_CHARS {
        return Err(StoreError::validation("invalid emoji"));
    }
    Ok(())
}

impl MessageStore {
    /// Add `user_id`'s `emoji` to a message. Adding an existing reaction is a
    /// no-op; a third distinct emoji from the same user is rejected.
    pub fn add_reaction(&self, message_id: Uuid, emoji: &str, user_id: Uuid) -> Result<Message> {
        validate_emoji(emoji)?;

        self.with_state(|state| {
            let row = state
                .row(message_id)
                .filter(|m| m.involves(user_id))
                .ok_or(StoreError::NotFoundOrUnauthorized)?;
            let row = row.clone();

            let reactions = state.reactions.entry(message_id).or_default();
            let already = reactions.iter().any(|r| r.user_id == user_id && r.emoji == emoji);
            if !already {
                let held = reactions.iter().filter(|r| r.user_id == user_id).count();
                if held >= MAX_REACTIONS_PER_USER {
                    return Err(StoreError::validation(format!(
                        "at most {} reactions per message",
                        MAX_REACTIONS_PER_USER
                    )));
                }
                reactions.push(ReactionRow {
                    user_id,
                    emoji: emoji.to_string(),
                });
                debug!("Reaction {} added to {} by {}", emoji, message_id, user_id);
            }

            Ok(state.canonical(&row))
        })
    }

    /// Remove `user_id`'s `emoji` from a message. Removing an absent reaction
    /// is a no-op.
    pub fn remove_reaction(&self, message_id: Uuid, emoji: &str, user_id: Uuid) -> Result<Message> {
        self.with_state(|state| {
            let row = state
                .row(message_id)
                .filter(|m| m.involves(user_id))
                .ok_or(StoreError::NotFoundOrUnauthorized)?
                .clone();

            if let Some(reactions) = state.reactions.get_mut(&message_id) {
                let before = reactions.len();
                reactions.retain(|r| !(r.user_id == user_id && r.emoji == emoji));
                if reactions.len() != before {
                    debug!("Reaction {} removed from {} by {}", emoji, message_id, user_id);
                }
                if reactions.is_empty() {
                    state.reactions.remove(&message_id);
                }
            }

            Ok(state.canonical(&row))
        })
    }
}
