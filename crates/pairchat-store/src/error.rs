use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Deliberately covers both "no such message" and "not yours".
    #[error("message not found")]
    NotFoundOrUnauthorized,

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
