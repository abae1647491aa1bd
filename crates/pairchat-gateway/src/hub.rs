use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use pairchat_store::{MessageStore, StoreError};
use pairchat_types::events::ServerEvent;
use pairchat_types::models::{Identity, Message, NewMessage, TypingStatus};

use crate::dispatcher::Dispatcher;

/// Applies mutations to the store and relays the canonical result to the
/// counterpart's live channel. Shared by the HTTP handlers and the push
/// channel so both paths fan out identically.
///
/// Each method returns the canonical result; confirming it to the caller is
/// the caller's job (HTTP response body or a push event on the originating
/// connection).
#[derive(Clone)]
pub struct Hub {
    store: Arc<MessageStore>,
    dispatcher: Dispatcher,
}

impl Hub {
    pub fn new(store: Arc<MessageStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn send_message(&self, sender: &Identity, new: NewMessage) -> Result<Message, StoreError> {
        let message = self.store.create_message(sender.user_id, new)?;
        self.push(message.receiver_id, ServerEvent::NewMessage(message.clone())).await;
        Ok(message)
    }

    pub async fn edit_message(
        &self,
        editor: &Identity,
        message_id: Uuid,
        content: &str,
    ) -> Result<Message, StoreError> {
        let message = self.store.edit_message(message_id, content, editor.user_id)?;
        self.push(message.receiver_id, ServerEvent::MessageEdited(message.clone())).await;
        Ok(message)
    }

    pub async fn delete_message(&self, requester: &Identity, message_id: Uuid) -> Result<(), StoreError> {
        self.store.delete_message(message_id, requester.user_id)?;
        self.push_to_counterpart(requester, ServerEvent::MessageDeleted { message_id })
            .await;
        Ok(())
    }

    pub async fn add_reaction(
        &self,
        reactor: &Identity,
        message_id: Uuid,
        emoji: &str,
    ) -> Result<Message, StoreError> {
        let message = self.store.add_reaction(message_id, emoji, reactor.user_id)?;
        self.push_to_counterpart(reactor, ServerEvent::ReactionAdded(message.clone()))
            .await;
        Ok(message)
    }

    pub async fn remove_reaction(
        &self,
        reactor: &Identity,
        message_id: Uuid,
        emoji: &str,
    ) -> Result<Message, StoreError> {
        let message = self.store.remove_reaction(message_id, emoji, reactor.user_id)?;
        self.push_to_counterpart(reactor, ServerEvent::ReactionRemoved(message.clone()))
            .await;
        Ok(message)
    }

    /// Fire-and-forget typing indicator.
    pub async fn typing(&self, sender: &Identity, is_typing: bool) {
        let status = TypingStatus {
            sender_username: sender.username.clone(),
            is_typing,
        };
        self.push_to_counterpart(sender, ServerEvent::Typing(status)).await;
    }

    async fn push_to_counterpart(&self, actor: &Identity, event: ServerEvent) {
        match self.store.counterpart_of(actor.user_id) {
            Ok(Some(counterpart)) => self.push(counterpart.id, event).await,
            Ok(None) => debug!("{} has no counterpart, dropping {}", actor.user_id, event.kind()),
            Err(e) => debug!("Counterpart lookup failed ({}), dropping {}", e, event.kind()),
        }
    }

    async fn push(&self, user_id: Uuid, event: ServerEvent) {
        let kind = event.kind();
        if self.dispatcher.send_to_user(user_id, event).await {
            debug!("Pushed {} to {}", kind, user_id);
        } else {
            debug!("{} has no live channel, dropping {}", user_id, kind);
        }
    }
}
