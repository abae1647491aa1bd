use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use pairchat_gateway::connection;

use crate::AppState;

/// Upgrade to the push channel. Authentication happens inside the channel
/// with an `auth` command, not on the upgrade request.
pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let hub = state.hub.clone();
    let auth = state.auth.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, hub, auth))
}
