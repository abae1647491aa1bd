pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod ws;

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use pairchat_auth::Authenticator;
use pairchat_gateway::Hub;

pub use error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub hub: Hub,
    pub auth: Authenticator,
}

/// Full HTTP surface: public login and health, bearer-protected message
/// routes, and the push channel upgrade.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/ws", get(ws::upgrade));

    let protected_routes = Router::new()
        .route("/users/me", get(auth::me))
        .route("/users/other", get(auth::other))
        .route("/messages", get(messages::list_messages).post(messages::send_message))
        .route("/messages/paginated", get(messages::paginated))
        .route("/messages/mark-seen", post(messages::mark_seen))
        .route(
            "/messages/{message_id}",
            put(messages::edit_message).delete(messages::delete_message),
        )
        .route(
            "/messages/{message_id}/reactions",
            post(reactions::add_reaction).delete(reactions::remove_reaction),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
