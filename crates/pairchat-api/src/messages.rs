use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::debug;
use uuid::Uuid;

use pairchat_store::pagination::clamp_limit;
use pairchat_types::api::{
    DeleteMessageResponse, EditMessageRequest, MarkSeenRequest, MarkSeenResponse, PageQuery,
    PaginatedMessages, SendMessageRequest,
};
use pairchat_types::models::{Identity, Message};

use crate::{ApiError, AppState};

/// Full snapshot of the pair's history, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let other = state.auth.counterpart(&identity)?;
    let messages = state.hub.store().messages_between(identity.user_id, other.id)?;
    Ok(Json(messages))
}

pub async fn paginated(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<Json<PaginatedMessages>, ApiError> {
    let limit = clamp_limit(query.limit);
    let offset = query.offset.unwrap_or(0);
    let other = state.auth.counterpart(&identity)?;

    let page = state.hub.store().page(identity.user_id, other.id, limit, offset)?;
    Ok(Json(PaginatedMessages {
        messages: page.messages,
        has_more: page.has_more,
        limit,
        offset,
    }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.hub.send_message(&identity, req.into()).await?;
    debug!("{} sent {} over HTTP", identity.username, message.id);
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<EditMessageRequest>, ApiError>,
) -> Result<Json<Message>, ApiError> {
    let message = state
        .hub
        .edit_message(&identity, message_id, &req.content)
        .await?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<DeleteMessageResponse>, ApiError> {
    state.hub.delete_message(&identity, message_id).await?;
    Ok(Json(DeleteMessageResponse {
        success: true,
        message_id,
    }))
}

/// Seen state is not pushed; the sender picks it up on the next snapshot.
pub async fn mark_seen(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(req), _): WithRejection<Json<MarkSeenRequest>, ApiError>,
) -> Result<Json<MarkSeenResponse>, ApiError> {
    let updated = state
        .hub
        .store()
        .mark_messages_as_seen(&req.message_ids, identity.user_id)?;
    if updated > 0 {
        debug!("{} marked {} messages seen", identity.username, updated);
    }
    Ok(Json(MarkSeenResponse {
        success: true,
        updated,
    }))
}
