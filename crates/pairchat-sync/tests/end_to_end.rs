use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use uuid::Uuid;

use pairchat_api::{AppState, AppStateInner, router};
use pairchat_auth::{Authenticator, hash_password};
use pairchat_gateway::{Dispatcher, Hub};
use pairchat_store::MessageStore;
use pairchat_store::models::UserRow;
use pairchat_sync::SyncClient;
use pairchat_types::events::ServerEvent;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> String {
    let store = Arc::new(
        MessageStore::new(vec![
            UserRow::new(Uuid::new_v4(), "alice", hash_password("alice-pw").unwrap()),
            UserRow::new(Uuid::new_v4(), "bob", hash_password("bob-pw").unwrap()),
        ])
        .unwrap(),
    );
    let auth = Authenticator::new(store.clone(), "e2e-secret", chrono::Duration::hours(1));
    let state: AppState = Arc::new(AppStateInner {
        hub: Hub::new(store, Dispatcher::new()),
        auth,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn pair(base: &str) -> (SyncClient, SyncClient) {
    let alice = SyncClient::login(base, "alice", "alice-pw").await.unwrap();
    let bob = SyncClient::login(base, "bob", "bob-pw").await.unwrap();
    (alice, bob)
}

async fn wait_for(events: &mut broadcast::Receiver<ServerEvent>, wanted: impl Fn(&ServerEvent) -> bool) -> ServerEvent {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if wanted(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("push channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for push event")
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let base = start_server().await;
    let err = SyncClient::login(&base, "alice", "nope").await.err().unwrap();
    assert!(matches!(err, pairchat_sync::SyncError::Server { status: 401, .. }));
}

#[tokio::test]
async fn two_clients_converge() {
    let base = start_server().await;
    let (alice, bob) = pair(&base).await;
    let bob_push = bob.connect_push().await.unwrap();
    let mut bob_events = bob_push.subscribe();

    // Send reaches Bob's view over push.
    let sent = alice.send_text("hi").await.unwrap();
    assert!(sent.seen_at.is_none() && sent.edited_at.is_none() && sent.reactions.is_empty());
    wait_for(&mut bob_events, |e| matches!(e, ServerEvent::NewMessage(m) if m.id == sent.id)).await;
    assert_eq!(bob.view().messages()[0].content, "hi");

    // A poll racing the push does not duplicate it.
    bob.poll_once().await.unwrap();
    assert_eq!(bob.view().messages().len(), 1);

    // Edit.
    alice.edit(sent.id, "hello").await.unwrap();
    wait_for(&mut bob_events, |e| matches!(e, ServerEvent::MessageEdited(_))).await;
    let seen_by_bob = bob.view().message(sent.id).cloned().unwrap();
    assert_eq!(seen_by_bob.content, "hello");
    assert!(seen_by_bob.edited_at.is_some());

    // Bob reads it; Alice learns on her next poll.
    assert_eq!(bob.mark_seen().await.unwrap(), 1);
    assert_eq!(bob.mark_seen().await.unwrap(), 0);
    alice.poll_once().await.unwrap();
    let seen_at = alice.view().message(sent.id).unwrap().seen_at;
    assert!(seen_at.is_some());
    alice.poll_once().await.unwrap();
    assert_eq!(alice.view().message(sent.id).unwrap().seen_at, seen_at);

    // React twice, then remove.
    alice.react(sent.id, "👍").await.unwrap();
    let reacted = alice.react(sent.id, "👍").await.unwrap();
    assert_eq!(reacted.reactions.len(), 1);
    alice.unreact(sent.id, "👍").await.unwrap();
    bob.poll_once().await.unwrap();
    assert!(bob.view().message(sent.id).unwrap().reactions.is_empty());

    // Typing goes over push only.
    let alice_push = alice.connect_push().await.unwrap();
    alice_push.typing(true).unwrap();
    wait_for(&mut bob_events, |e| matches!(e, ServerEvent::Typing(_))).await;
    assert_eq!(bob.view().typing(), Some("alice"));

    // Delete.
    alice.delete(sent.id).await.unwrap();
    wait_for(&mut bob_events, |e| matches!(e, ServerEvent::MessageDeleted { .. })).await;
    assert!(bob.view().messages().is_empty());

    alice_push.close();
    bob_push.close();
}

#[tokio::test]
async fn backfill_walks_history_once() {
    let base = start_server().await;
    let (alice, bob) = pair(&base).await;
    let mut sent = Vec::new();
    for i in 0..5 {
        sent.push(alice.send_text(&format!("m{i}")).await.unwrap().id);
    }

    bob.load_initial(2).await.unwrap();
    assert!(bob.view().has_more());
    assert_eq!(bob.load_more(2).await.unwrap(), 2);
    assert_eq!(bob.load_more(2).await.unwrap(), 1);
    assert!(!bob.view().has_more());

    let ids: Vec<Uuid> = bob.view().messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, sent);
}

#[tokio::test]
async fn polling_alone_catches_up() {
    let base = start_server().await;
    let (alice, bob) = pair(&base).await;
    let poller = bob.spawn_polling(Duration::from_millis(50));

    let sent = alice.send_text("no push needed").await.unwrap();
    timeout(WAIT, async {
        while bob.view().message(sent.id).is_none() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("poll never delivered the message");

    poller.abort();
}
