use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use pairchat_auth::AuthError;
use pairchat_store::StoreError;
use pairchat_types::api::ErrorBody;

/// Every handler failure, rendered as a status code plus `{"message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Message not found or not authorized")]
    NotFound,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(reason) => ApiError::Validation(reason),
            StoreError::NotFoundOrUnauthorized => ApiError::NotFound,
            StoreError::LockPoisoned => {
                error!("Message store lock poisoned");
                ApiError::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing bearer token"),
            AuthError::InvalidToken | AuthError::UnknownUser => ApiError::Unauthorized("Invalid token"),
            AuthError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials"),
            AuthError::Store(e) => e.into(),
            e @ (AuthError::NoCounterpart | AuthError::Encoding(_) | AuthError::Hashing(_)) => {
                error!("Auth failure: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// The only path parameter is a message id, so an unparsable one names no
/// message.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
