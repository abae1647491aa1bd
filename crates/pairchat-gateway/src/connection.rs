use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pairchat_auth::Authenticator;
use pairchat_store::StoreError;
use pairchat_types::events::{ClientCommand, ErrorKind, ServerEvent};
use pairchat_types::models::Identity;

use crate::dispatcher::EventSender;
use crate::hub::Hub;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// Longest slice of a rejected frame echoed into the log.
const LOGGED_FRAME_CHARS: usize = 200;

/// Drive one push connection from open to close.
///
/// The socket is split: a writer task owns the sink and drains this
/// connection's outbound queue plus the heartbeat, and a reader task feeds
/// frames into a [`Session`]. Whichever finishes first tears down the other,
/// then the registry slot is released if it still belongs to this connection.
pub async fn handle_connection(socket: WebSocket, hub: Hub, auth: Authenticator) {
    let (mut sender, mut receiver) = socket.split();
    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    info!("Push connection {} opened", conn_id);
    let mut session = Session::new(conn_id, tx, hub.clone(), auth);
    session.greet();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode {} event: {}", event.kind(), e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= MAX_MISSED_PONGS {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => session.handle_text(text.as_str()).await,
                Message::Binary(_) => session.reject_frame("binary frames are not supported"),
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    match hub.dispatcher().unregister_connection(conn_id).await {
        Some(user_id) => info!("{} disconnected from push connection {}", user_id, conn_id),
        None => info!("Push connection {} closed", conn_id),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Only `auth` and `ping` are accepted.
    Unauthenticated,
    /// Bound to an identity in the dispatcher.
    Authenticated(Identity),
}

/// Per-connection command handling, independent of the socket so it can be
/// driven directly.
pub struct Session {
    conn_id: Uuid,
    outbound: EventSender,
    hub: Hub,
    auth: Authenticator,
    state: ConnectionState,
}

impl Session {
    pub fn new(conn_id: Uuid, outbound: EventSender, hub: Hub, auth: Authenticator) -> Self {
        Self {
            conn_id,
            outbound,
            hub,
            auth,
            state: ConnectionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Handshake greeting, sent before anything else on the connection.
    pub fn greet(&self) {
        self.reply(ServerEvent::Connected {
            message: "WebSocket connected".into(),
        });
    }

    /// Decode and handle one text frame. Undecodable frames get an `error`
    /// event; the connection stays usable.
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientCommand>(text) {
            Ok(cmd) => self.handle_command(cmd).await,
            Err(e) => {
                let preview: String = text.chars().take(LOGGED_FRAME_CHARS).collect();
                warn!("Connection {} bad frame: {} -- raw: {}", self.conn_id, e, preview);
                self.reply(ServerEvent::error(ErrorKind::Channel, "Invalid message format"));
            }
        }
    }

    pub fn reject_frame(&self, reason: &str) {
        warn!("Connection {} rejected frame: {}", self.conn_id, reason);
        self.reply(ServerEvent::error(ErrorKind::Channel, reason));
    }

    pub async fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Ping => self.reply(ServerEvent::Pong),
            ClientCommand::Auth { token } => self.authenticate(&token).await,
            cmd => match &self.state {
                ConnectionState::Authenticated(identity) => {
                    let identity = identity.clone();
                    self.handle_authenticated(identity, cmd).await;
                }
                ConnectionState::Unauthenticated => {
                    debug!("Connection {} sent a command before auth", self.conn_id);
                    self.reply(ServerEvent::error(ErrorKind::Auth, "Not authenticated"));
                }
            },
        }
    }

    async fn authenticate(&mut self, token: &str) {
        let identity = match self.auth.resolve(token) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Push auth failed on connection {}: {}", self.conn_id, e);
                self.reply(ServerEvent::AuthError {
                    message: "Invalid token".into(),
                });
                return;
            }
        };

        // Re-auth on the same socket may switch identity.
        let dispatcher = self.hub.dispatcher();
        dispatcher.unregister_connection(self.conn_id).await;
        dispatcher
            .register(identity.user_id, self.conn_id, self.outbound.clone())
            .await;

        info!(
            "{} ({}) authenticated on push connection {}",
            identity.username, identity.user_id, self.conn_id
        );
        self.reply(ServerEvent::AuthSuccess {
            user_id: identity.user_id,
            username: identity.username.clone(),
        });
        self.state = ConnectionState::Authenticated(identity);
    }

    async fn handle_authenticated(&self, identity: Identity, cmd: ClientCommand) {
        let hub = &self.hub;
        let result = match cmd {
            ClientCommand::Message(req) => hub
                .send_message(&identity, req.into())
                .await
                .map(ServerEvent::MessageSent),
            ClientCommand::EditMessage { message_id, content } => hub
                .edit_message(&identity, message_id, &content)
                .await
                .map(ServerEvent::MessageEdited),
            ClientCommand::DeleteMessage { message_id } => hub
                .delete_message(&identity, message_id)
                .await
                .map(|()| ServerEvent::MessageDeleted { message_id }),
            ClientCommand::AddReaction { message_id, emoji } => hub
                .add_reaction(&identity, message_id, &emoji)
                .await
                .map(ServerEvent::ReactionAdded),
            ClientCommand::RemoveReaction { message_id, emoji } => hub
                .remove_reaction(&identity, message_id, &emoji)
                .await
                .map(ServerEvent::ReactionRemoved),
            ClientCommand::Typing { is_typing, .. } => {
                hub.typing(&identity, is_typing).await;
                return;
            }
            // Handled before the auth check.
            ClientCommand::Auth { .. } | ClientCommand::Ping => return,
        };

        match result {
            Ok(event) => self.reply(event),
            Err(e) => {
                debug!("{} command rejected: {}", identity.username, e);
                self.reply(store_error_event(&e));
            }
        }
    }

    fn reply(&self, event: ServerEvent) {
        if self.outbound.send(event).is_err() {
            debug!("Connection {} writer gone, reply dropped", self.conn_id);
        }
    }
}

fn store_error_event(err: &StoreError) -> ServerEvent {
    match err {
        StoreError::Validation(reason) => ServerEvent::error(ErrorKind::Validation, reason.clone()),
        StoreError::NotFoundOrUnauthorized => ServerEvent::error(ErrorKind::NotFound, "Message not found"),
        StoreError::LockPoisoned => ServerEvent::error(ErrorKind::Internal, "Internal error"),
    }
}

#[cfg(test)]
mod tests {
    use pairchat_store::MessageStore;
    use pairchat_store::models::UserRow;
    use pairchat_types::api::SendMessageRequest;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::dispatcher::Dispatcher;

    const ALICE: Uuid = Uuid::from_u128(1);
    const BOB: Uuid = Uuid::from_u128(2);

    struct Fixture {
        hub: Hub,
        auth: Authenticator,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(
                MessageStore::new(vec![
                    UserRow::new(ALICE, "alice", "h"),
                    UserRow::new(BOB, "bob", "h"),
                ])
                .unwrap(),
            );
            let auth = Authenticator::new(store.clone(), "test-secret", chrono::Duration::hours(1));
            Self {
                hub: Hub::new(store, Dispatcher::new()),
                auth,
            }
        }

        fn session(&self) -> (Session, UnboundedReceiver<ServerEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Session::new(Uuid::new_v4(), tx, self.hub.clone(), self.auth.clone()),
                rx,
            )
        }

        fn token(&self, user_id: Uuid, username: &str) -> String {
            self.auth
                .issue_token(&Identity {
                    user_id,
                    username: username.into(),
                })
                .unwrap()
        }
    }

    async fn authed(fx: &Fixture, user_id: Uuid, username: &str) -> (Session, UnboundedReceiver<ServerEvent>) {
        let (mut session, mut rx) = fx.session();
        session
            .handle_command(ClientCommand::Auth {
                token: fx.token(user_id, username),
            })
            .await;
        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::AuthSuccess { .. }));
        (session, rx)
    }

    #[tokio::test]
    async fn test_greeting_comes_first() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.session();
        session.greet();
        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::Connected { .. }));

        // A closed writer drops the greeting instead of failing.
        drop(rx);
        session.greet();
    }

    #[tokio::test]
    async fn test_commands_require_auth() {
        let fx = Fixture::new();
        let (mut session, mut rx) = fx.session();

        session
            .handle_command(ClientCommand::Message(SendMessageRequest::text(BOB, "hi")))
            .await;
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::Error { kind: ErrorKind::Auth, .. }
        ));
        assert_eq!(session.state(), &ConnectionState::Unauthenticated);
        assert!(fx.hub.store().messages_between(ALICE, BOB).unwrap().is_empty());

        session.handle_command(ClientCommand::Ping).await;
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::Pong);
    }

    #[tokio::test]
    async fn test_bad_token_keeps_connection_unauthenticated() {
        let fx = Fixture::new();
        let (mut session, mut rx) = fx.session();

        session
            .handle_command(ClientCommand::Auth {
                token: "garbage".into(),
            })
            .await;
        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::AuthError { .. }));
        assert_eq!(session.state(), &ConnectionState::Unauthenticated);

        // Retry succeeds on the same session.
        session
            .handle_command(ClientCommand::Auth {
                token: fx.token(ALICE, "alice"),
            })
            .await;
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::AuthSuccess { user_id, .. } if user_id == ALICE
        ));
        assert!(fx.hub.dispatcher().is_connected(ALICE).await);
    }

    #[tokio::test]
    async fn test_malformed_frame_reports_channel_error() {
        let fx = Fixture::new();
        let (mut session, mut rx) = fx.session();

        session.handle_text("{not json").await;
        session.handle_text(r#"{"type":"launch_rockets","data":{}}"#).await;
        for _ in 0..2 {
            assert!(matches!(
                rx.try_recv().unwrap(),
                ServerEvent::Error { kind: ErrorKind::Channel, .. }
            ));
        }

        session.handle_text(r#"{"type":"ping"}"#).await;
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::Pong);
    }

    #[tokio::test]
    async fn test_send_confirms_to_origin_and_relays_to_counterpart() {
        let fx = Fixture::new();
        let (mut alice, mut alice_rx) = authed(&fx, ALICE, "alice").await;
        let (_bob, mut bob_rx) = authed(&fx, BOB, "bob").await;

        alice
            .handle_command(ClientCommand::Message(SendMessageRequest::text(BOB, "hi")))
            .await;

        let ServerEvent::MessageSent(sent) = alice_rx.try_recv().unwrap() else {
            panic!("expected message_sent");
        };
        assert_eq!(sent.content, "hi");
        assert_eq!(bob_rx.try_recv().unwrap(), ServerEvent::NewMessage(sent.clone()));

        alice
            .handle_command(ClientCommand::DeleteMessage { message_id: sent.id })
            .await;
        let deleted = ServerEvent::MessageDeleted { message_id: sent.id };
        assert_eq!(alice_rx.try_recv().unwrap(), deleted);
        assert_eq!(bob_rx.try_recv().unwrap(), deleted);
    }

    #[tokio::test]
    async fn test_store_rejections_become_error_events() {
        let fx = Fixture::new();
        let (mut alice, mut alice_rx) = authed(&fx, ALICE, "alice").await;

        alice
            .handle_command(ClientCommand::Message(SendMessageRequest::text(BOB, "   ")))
            .await;
        assert!(matches!(
            alice_rx.try_recv().unwrap(),
            ServerEvent::Error { kind: ErrorKind::Validation, .. }
        ));

        alice
            .handle_command(ClientCommand::EditMessage {
                message_id: Uuid::new_v4(),
                content: "x".into(),
            })
            .await;
        assert!(matches!(
            alice_rx.try_recv().unwrap(),
            ServerEvent::Error { kind: ErrorKind::NotFound, .. }
        ));

        // Still usable afterwards.
        alice.handle_command(ClientCommand::Ping).await;
        assert_eq!(alice_rx.try_recv().unwrap(), ServerEvent::Pong);
    }

    #[tokio::test]
    async fn test_typing_is_relayed_without_confirmation() {
        let fx = Fixture::new();
        let (mut alice, mut alice_rx) = authed(&fx, ALICE, "alice").await;
        let (_bob, mut bob_rx) = authed(&fx, BOB, "bob").await;

        alice
            .handle_command(ClientCommand::Typing {
                is_typing: true,
                receiver_id: Some(BOB),
            })
            .await;
        assert!(alice_rx.try_recv().is_err());
        assert!(matches!(bob_rx.try_recv().unwrap(), ServerEvent::Typing(status) if status.is_typing));
    }
}
