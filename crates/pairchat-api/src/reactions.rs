use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use pairchat_types::api::{ReactionRequest, ReactionResponse};
use pairchat_types::models::Identity;

use crate::{ApiError, AppState};

pub async fn add_reaction(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<ReactionRequest>, ApiError>,
) -> Result<Json<ReactionResponse>, ApiError> {
    let message = state
        .hub
        .add_reaction(&identity, message_id, &req.emoji)
        .await?;
    Ok(Json(ReactionResponse {
        success: true,
        message,
    }))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<ReactionRequest>, ApiError>,
) -> Result<Json<ReactionResponse>, ApiError> {
    let message = state
        .hub
        .remove_reaction(&identity, message_id, &req.emoji)
        .await?;
    Ok(Json(ReactionResponse {
        success: true,
        message,
    }))
}
