#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use pairchat_api::{AppState, AppStateInner, router};
use pairchat_auth::{Authenticator, hash_password};
use pairchat_gateway::{Dispatcher, Hub};
use pairchat_store::MessageStore;
use pairchat_store::models::UserRow;
use pairchat_types::models::Identity;

pub const ALICE: Uuid = Uuid::from_u128(1);
pub const BOB: Uuid = Uuid::from_u128(2);

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub alice_token: String,
    pub bob_token: String,
}

impl TestApp {
    /// Passwords are only hashed when a test needs to exercise login.
    pub fn new() -> Self {
        Self::with_hashes("unused".into(), "unused".into())
    }

    pub fn with_passwords(alice: &str, bob: &str) -> Self {
        Self::with_hashes(hash_password(alice).unwrap(), hash_password(bob).unwrap())
    }

    fn with_hashes(alice_hash: String, bob_hash: String) -> Self {
        let store = Arc::new(
            MessageStore::new(vec![
                UserRow::new(ALICE, "alice", alice_hash),
                UserRow::new(BOB, "bob", bob_hash),
            ])
            .unwrap(),
        );
        let auth = Authenticator::new(store.clone(), "integration-secret", chrono::Duration::hours(1));
        let state: AppState = Arc::new(AppStateInner {
            hub: Hub::new(store, Dispatcher::new()),
            auth,
        });

        let alice_token = token(&state, ALICE, "alice");
        let bob_token = token(&state, BOB, "bob");

        Self {
            router: router(state.clone()),
            state,
            alice_token,
            bob_token,
        }
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.call_raw(method, uri, token, body.map(|b| b.to_string())).await
    }

    /// Like [`TestApp::call`] but sends `body` verbatim as `application/json`.
    pub async fn call_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn as_alice(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(method, uri, Some(&self.alice_token), body).await
    }

    pub async fn as_bob(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(method, uri, Some(&self.bob_token), body).await
    }
}

fn token(state: &AppState, user_id: Uuid, username: &str) -> String {
    state
        .auth
        .issue_token(&Identity {
            user_id,
            username: username.into(),
        })
        .unwrap()
}
