use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pairchat_types::api::{
    DeleteMessageResponse, EditMessageRequest, ErrorBody, LoginRequest, LoginResponse,
    MarkSeenRequest, MarkSeenResponse, PaginatedMessages, ReactionRequest, ReactionResponse,
    SendMessageRequest,
};
use pairchat_types::events::{ClientCommand, ServerEvent};
use pairchat_types::models::{Message, User};

use crate::error::{Result, SyncError};
use crate::state::{ConversationView, Update};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Buffered push events per observer before the oldest are dropped.
const EVENT_BUFFER: usize = 64;

/// A logged-in participant kept in sync with the server.
///
/// Every response and push event is folded into one shared
/// [`ConversationView`], so HTTP results, polls and pushes can land in any
/// order.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    token: String,
    user: User,
    view: Mutex<ConversationView>,
}

impl SyncClient {
    pub async fn login(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let http = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = http
            .post(format!("{base_url}/auth/login"))
            .json(&LoginRequest {
                username: username.into(),
                password: password.into(),
            })
            .send()
            .await?;
        let LoginResponse { token, user } = decode(response).await?;
        info!("Logged in as {} ({})", user.username, user.id);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                token,
                user,
                view: Mutex::new(ConversationView::new()),
            }),
        })
    }

    pub fn user(&self) -> &User {
        &self.inner.user
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    /// Lock the shared view for reading.
    pub fn view(&self) -> MutexGuard<'_, ConversationView> {
        self.inner.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, update: Update) {
        self.view().apply(update);
    }

    pub async fn counterpart(&self) -> Result<User> {
        self.request(self.get("/users/other")).await
    }

    /// Fetch the newest page and seed the view with it.
    pub async fn load_initial(&self, limit: usize) -> Result<()> {
        let page = self.fetch_page(limit, 0).await?;
        self.apply(Update::Page {
            messages: page.messages,
            has_more: page.has_more,
        });
        Ok(())
    }

    /// Backfill the next older page. Returns how many messages were new.
    pub async fn load_more(&self, limit: usize) -> Result<usize> {
        let offset = self.view().next_offset();
        let page = self.fetch_page(limit, offset).await?;
        Ok(self.view().apply_page(page.messages, page.has_more))
    }

    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<PaginatedMessages> {
        let builder = self
            .get("/messages/paginated")
            .query(&[("limit", limit), ("offset", offset)]);
        self.request(builder).await
    }

    /// One full-snapshot poll.
    pub async fn poll_once(&self) -> Result<()> {
        let messages: Vec<Message> = self.request(self.get("/messages")).await?;
        self.apply(Update::Snapshot(messages));
        Ok(())
    }

    /// Poll the snapshot endpoint on `every` until the task is aborted.
    /// Failed polls are logged and retried on the next tick.
    pub fn spawn_polling(&self, every: Duration) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = client.poll_once().await {
                    warn!("Snapshot poll failed: {}", e);
                }
            }
        })
    }

    pub async fn send(&self, req: SendMessageRequest) -> Result<Message> {
        let message: Message = self
            .request(self.post("/messages").json(&req))
            .await?;
        self.apply(Update::Created(message.clone()));
        Ok(message)
    }

    pub async fn send_text(&self, content: &str) -> Result<Message> {
        let other = self.counterpart().await?;
        self.send(SendMessageRequest::text(other.id, content)).await
    }

    pub async fn edit(&self, message_id: Uuid, content: &str) -> Result<Message> {
        let message: Message = self
            .request(
                self.authed(self.inner.http.put(self.url(&format!("/messages/{message_id}"))))
                    .json(&EditMessageRequest {
                        content: content.into(),
                    }),
            )
            .await?;
        self.apply(Update::Edited(message.clone()));
        Ok(message)
    }

    pub async fn delete(&self, message_id: Uuid) -> Result<()> {
        let _: DeleteMessageResponse = self
            .request(self.authed(self.inner.http.delete(self.url(&format!("/messages/{message_id}")))))
            .await?;
        self.apply(Update::Deleted(message_id));
        Ok(())
    }

    pub async fn react(&self, message_id: Uuid, emoji: &str) -> Result<Message> {
        let response: ReactionResponse = self
            .request(
                self.post(&format!("/messages/{message_id}/reactions"))
                    .json(&ReactionRequest { emoji: emoji.into() }),
            )
            .await?;
        self.apply(Update::ReactionChanged(response.message.clone()));
        Ok(response.message)
    }

    pub async fn unreact(&self, message_id: Uuid, emoji: &str) -> Result<Message> {
        let response: ReactionResponse = self
            .request(
                self.authed(
                    self.inner
                        .http
                        .delete(self.url(&format!("/messages/{message_id}/reactions"))),
                )
                .json(&ReactionRequest { emoji: emoji.into() }),
            )
            .await?;
        self.apply(Update::ReactionChanged(response.message.clone()));
        Ok(response.message)
    }

    /// Mark everything addressed to us as seen: optimistically in the view,
    /// then in one batch call. A failed call reverts the optimistic values.
    pub async fn mark_seen(&self) -> Result<usize> {
        let ids = self.view().take_unseen_for(self.inner.user.id);
        if ids.is_empty() {
            return Ok(0);
        }

        let result: Result<MarkSeenResponse> = self
            .request(self.post("/messages/mark-seen").json(&MarkSeenRequest {
                message_ids: ids.clone(),
            }))
            .await;
        match result {
            Ok(response) => {
                self.view().confirm_seen(&ids);
                Ok(response.updated)
            }
            Err(e) => {
                self.view().reject_seen(&ids);
                Err(e)
            }
        }
    }

    /// Open the push channel and authenticate it. Events are folded into the
    /// view until the returned handle is closed or the socket drops.
    pub async fn connect_push(&self) -> Result<PushHandle> {
        let ws_url = format!(
            "{}/ws",
            self.inner
                .base_url
                .replacen("http://", "ws://", 1)
                .replacen("https://", "wss://", 1)
        );
        let (mut ws, _) = connect_async(&ws_url).await?;

        expect_event(&mut ws, |e| matches!(e, ServerEvent::Connected { .. })).await?;
        let auth = ClientCommand::Auth {
            token: self.inner.token.clone(),
        };
        ws.send(WsMessage::text(serde_json::to_string(&auth)?)).await?;
        match expect_event(&mut ws, |e| {
            matches!(e, ServerEvent::AuthSuccess { .. } | ServerEvent::AuthError { .. })
        })
        .await?
        {
            ServerEvent::AuthError { message } => return Err(SyncError::PushAuth(message)),
            _ => info!("Push channel authenticated for {}", self.inner.user.username),
        }

        let (outbound, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let task = tokio::spawn(run_push(ws, rx, self.clone(), events.clone()));

        Ok(PushHandle {
            outbound,
            events,
            task,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.inner.token)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authed(self.inner.http.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authed(self.inner.http.post(self.url(path)))
    }

    async fn request<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        decode(builder.send().await?).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| status.to_string());
        return Err(SyncError::Server {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

/// Read frames until one decodes to an event accepted by `wanted`.
async fn expect_event(ws: &mut WsStream, wanted: impl Fn(&ServerEvent) -> bool) -> Result<ServerEvent> {
    while let Some(frame) = ws.next().await {
        if let WsMessage::Text(text) = frame? {
            let event: ServerEvent = serde_json::from_str(text.as_str())?;
            if wanted(&event) {
                return Ok(event);
            }
            debug!("Skipping {} during handshake", event.kind());
        }
    }
    Err(SyncError::ChannelClosed)
}

async fn run_push(
    ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientCommand>,
    client: SyncClient,
    events: broadcast::Sender<ServerEvent>,
) {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Push channel read failed: {}", e);
                        break;
                    }
                };
                let event = match serde_json::from_str::<ServerEvent>(text.as_str()) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Undecodable push frame: {}", e);
                        continue;
                    }
                };
                if let ServerEvent::Error { kind, message } = &event {
                    warn!("Server reported {:?} error: {}", kind, message);
                }
                if let Some(update) = Update::from_event(event.clone()) {
                    client.apply(update);
                }
                // No observers is fine.
                let _ = events.send(event);
            }
            cmd = outbound.recv() => {
                let Some(cmd) = cmd else { break };
                let text = match serde_json::to_string(&cmd) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode push command: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::text(text)).await {
                    warn!("Push channel write failed: {}", e);
                    break;
                }
            }
        }
    }

    info!("Push channel for {} closed", client.inner.user.username);
}

/// Live push connection. Dropping the handle leaves the reader running;
/// call [`PushHandle::close`] to stop it.
pub struct PushHandle {
    outbound: mpsc::UnboundedSender<ClientCommand>,
    events: broadcast::Sender<ServerEvent>,
    task: JoinHandle<()>,
}

impl PushHandle {
    pub fn send(&self, cmd: ClientCommand) -> Result<()> {
        self.outbound.send(cmd).map_err(|_| SyncError::ChannelClosed)
    }

    pub fn typing(&self, is_typing: bool) -> Result<()> {
        self.send(ClientCommand::Typing {
            is_typing,
            receiver_id: None,
        })
    }

    /// Observe every decoded push event, after it has been applied to the view.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    pub fn close(self) {
        self.task.abort();
    }
}
