use axum::{Extension, Json, extract::State};
use axum_extra::extract::WithRejection;
use tracing::info;

use pairchat_types::api::{LoginRequest, LoginResponse};
use pairchat_types::models::{Identity, User};

use crate::{ApiError, AppState};

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<LoginResponse>, ApiError> {
    let response = state.auth.login(&req.username, &req.password)?;
    info!("{} logged in", response.user.username);
    Ok(Json(response))
}

pub async fn me(Extension(identity): Extension<Identity>) -> Json<User> {
    Json(User {
        id: identity.user_id,
        username: identity.username,
    })
}

/// The other participant of the pair.
pub async fn other(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.auth.counterpart(&identity)?))
}
