use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use tracing::debug;

use pairchat_auth::AuthError;

use crate::{ApiError, AppState};

/// Resolve the bearer token to an `Identity` and stash it as a request
/// extension for the handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| AuthError::MissingCredentials)?;

    let identity = state.auth.resolve(bearer.token()).map_err(|e| {
        debug!("Rejected bearer token on {}: {}", req.uri().path(), e);
        e
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
