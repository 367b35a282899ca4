//! Credential resolution for WebSocket and REST callers.
//!
//! The realtime layer only needs "token in, user id out"; how tokens are
//! minted and which users exist is the business of whoever implements
//! [`CredentialResolver`]. The server ships an HS256 JWT resolver backed by
//! the in-memory [`UserDirectory`].

pub mod jwt;
pub mod middleware;

use async_trait::async_trait;
use std::sync::Arc;

use crate::users::UserDirectory;
use crate::ws::UserId;

/// Why a credential was refused.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token does not match a known user")]
    UnknownUser,
}

impl AuthError {
    /// Reason text sent in the WebSocket close frame.
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "Missing token",
            Self::Expired => "Token expired",
            Self::Invalid(_) => "Token invalid",
            Self::UnknownUser => "Unknown user",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err.to_string()),
        }
    }
}

/// Resolves an opaque bearer credential to the user it belongs to.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve_credential(&self, token: &str) -> Result<UserId, AuthError>;
}

/// Resolves HS256 access tokens whose `sub` claim is the numeric id of an
/// active user in the directory.
pub struct JwtCredentialResolver {
    secret: Vec<u8>,
    users: Arc<UserDirectory>,
}

impl JwtCredentialResolver {
    pub fn new(secret: Vec<u8>, users: Arc<UserDirectory>) -> Self {
        Self { secret, users }
    }
}

#[async_trait]
impl CredentialResolver for JwtCredentialResolver {
    async fn resolve_credential(&self, token: &str) -> Result<UserId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let claims = jwt::validate_access_token(&self.secret, token)?;
        let user_id = claims.user_id()?;
        if !self.users.is_active(user_id) {
            return Err(AuthError::UnknownUser);
        }
        Ok(user_id)
    }
}
