use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use pairchat_types::events::ServerEvent;

/// Outbound queue of one push connection. The connection's writer task
/// drains it in order, which gives per-connection FIFO delivery.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Registry of live push channels: at most one per user.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, EventSender)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user_id` to a connection. Replaces any existing binding and
    /// returns the displaced conn_id; the displaced socket is left open but
    /// stops receiving pushes.
    pub async fn register(&self, user_id: Uuid, conn_id: Uuid, sender: EventSender) -> Option<Uuid> {
        let previous = self
            .inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, sender))
            .map(|(old_conn, _)| old_conn)
            .filter(|old_conn| *old_conn != conn_id);

        if let Some(old_conn) = previous {
            debug!("User {} rebound from connection {} to {}", user_id, old_conn, conn_id);
        }
        previous
    }

    /// Drop whatever binding still points at `conn_id`. Returns the user that
    /// was unbound, if any. A newer connection for the same user is untouched.
    pub async fn unregister_connection(&self, conn_id: Uuid) -> Option<Uuid> {
        let mut channels = self.inner.user_channels.write().await;
        let user_id = channels
            .iter()
            .find(|(_, (cid, _))| *cid == conn_id)
            .map(|(uid, _)| *uid)?;
        channels.remove(&user_id);
        Some(user_id)
    }

    /// Queue an event for a user's live channel. Returns false when the user
    /// has no live channel; nothing is retained for later delivery.
    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) -> bool {
        let channels = self.inner.user_channels.read().await;
        match channels.get(&user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub async fn is_connected(&self, user_id: Uuid) -> bool {
        self.inner.user_channels.read().await.contains_key(&user_id)
    }

    /// conn_id currently bound to `user_id`.
    pub async fn connection_of(&self, user_id: Uuid) -> Option<Uuid> {
        self.inner
            .user_channels
            .read()
            .await
            .get(&user_id)
            .map(|(conn_id, _)| *conn_id)
    }
}
