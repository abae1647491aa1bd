//! Credential checks and bearer tokens.
//!
//! The rest of the system only asks two questions of this crate: which
//! participant is behind a token, and who is the other participant.

pub mod password;

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::{debug, warn};

use pairchat_store::{MessageStore, StoreError};
use pairchat_types::api::{Claims, LoginResponse};
use pairchat_types::models::{Identity, User};

pub use password::{hash_password, verify_password};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid token")]
    InvalidToken,

    /// Token was valid but names a user this deployment does not know.
    #[error("unknown user")]
    UnknownUser,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no counterpart for user")]
    NoCounterpart,

    #[error("token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues and resolves bearer tokens against the store's user namespace.
#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    store: Arc<MessageStore>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
}

impl Authenticator {
    pub fn new(store: Arc<MessageStore>, secret: &str, token_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                store,
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                token_ttl,
            }),
        }
    }

    /// Check a username/password pair and issue a token for it.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let Some(row) = self.inner.store.user_by_username(username)? else {
            debug!("Login attempt for unknown user {}", username);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &row.password_hash) {
            warn!("Failed login for {}", username);
            return Err(AuthError::InvalidCredentials);
        }

        let user = row.to_user();
        let token = self.issue_token(&Identity::from(user.clone()))?;
        Ok(LoginResponse { token, user })
    }

    pub fn issue_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let claims = Claims {
            sub: identity.user_id,
            username: identity.username.clone(),
            exp: (Utc::now() + self.inner.token_ttl).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.inner.encoding)?)
    }

    /// Resolve a bearer token to a participant. Signature, expiry, and that the
    /// subject still exists are all checked.
    pub fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.inner.decoding, &Validation::default())
            .map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .inner
            .store
            .user(data.claims.sub)?
            .ok_or(AuthError::UnknownUser)?;

        Ok(user.into())
    }

    /// The other participant of the pair.
    pub fn counterpart(&self, identity: &Identity) -> Result<User, AuthError> {
        self.inner
            .store
            .counterpart_of(identity.user_id)?
            .ok_or(AuthError::NoCounterpart)
    }
}

#[cfg(test)]
mod tests {
    use pairchat_store::models::UserRow;
    use uuid::Uuid;

    use super::*;

    const SECRET: &str = "test-secret";

    fn authenticator(alice_hash: &str) -> Authenticator {
        let store = MessageStore::new(vec![
            UserRow::new(Uuid::from_u128(1), "alice", alice_hash),
            UserRow::new(Uuid::from_u128(2), "bob", "unused-hash"),
        ])
        .unwrap();
        Authenticator::new(Arc::new(store), SECRET, Duration::hours(24))
    }

    fn alice() -> Identity {
        Identity {
            user_id: Uuid::from_u128(1),
            username: "alice".into(),
        }
    }

    #[test]
    fn test_issue_and_resolve() {
        let auth = authenticator("unused-hash");
        let token = auth.issue_token(&alice()).unwrap();
        assert_eq!(auth.resolve(&token).unwrap(), alice());
        assert_eq!(auth.counterpart(&alice()).unwrap().username, "bob");
    }

    #[test]
    fn test_rejects_foreign_and_garbage_tokens() {
        let auth = authenticator("unused-hash");
        assert!(matches!(auth.resolve("not.a.jwt"), Err(AuthError::InvalidToken)));

        let other = Authenticator::new(
            Arc::new(
                MessageStore::new(vec![
                    UserRow::new(Uuid::from_u128(1), "alice", "h"),
                    UserRow::new(Uuid::from_u128(2), "bob", "h"),
                ])
                .unwrap(),
            ),
            "different-secret",
            Duration::hours(1),
        );
        let token = other.issue_token(&alice()).unwrap();
        assert!(matches!(auth.resolve(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_rejects_expired_token() {
        let auth = authenticator("unused-hash");
        let claims = Claims {
            sub: alice().user_id,
            username: "alice".into(),
            exp: (Utc::now() - Duration::hours(2)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(auth.resolve(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_rejects_unknown_subject() {
        let auth = authenticator("unused-hash");
        let stranger = Identity {
            user_id: Uuid::new_v4(),
            username: "mallory".into(),
        };
        let token = auth.issue_token(&stranger).unwrap();
        assert!(matches!(auth.resolve(&token), Err(AuthError::UnknownUser)));
    }

    #[test]
    fn test_login() {
        let auth = authenticator(&hash_password("password123").unwrap());

        let response = auth.login("alice", "password123").unwrap();
        assert_eq!(response.user.username, "alice");
        assert_eq!(auth.resolve(&response.token).unwrap(), alice());

        assert!(matches!(
            auth.login("alice", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("carol", "password123"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
