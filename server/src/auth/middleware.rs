use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::state::AppState;
use crate::users::User;
use crate::ws::UserId;

/// JWT claims extracted from Authorization: Bearer header.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, decimal
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| AuthError::Invalid(format!("non-numeric subject {:?}", self.sub)))
    }
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Extract Bearer token from Authorization header
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Get JWT secret from request extensions (set by middleware layer)
        let jwt_secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

        let claims = crate::auth::jwt::validate_access_token(&jwt_secret.0, token).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            StatusCode::UNAUTHORIZED
        })?;
        claims.user_id().map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(claims)
    }
}

/// The account behind a valid bearer token. Tokens for users the directory
/// does not know (or no longer considers active) are rejected with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;
        let user_id = claims.user_id().map_err(|_| StatusCode::UNAUTHORIZED)?;

        state
            .users
            .get(user_id)
            .filter(|user| user.is_active)
            .map(CurrentUser)
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, "Bearer token for unknown user");
                StatusCode::UNAUTHORIZED
            })
    }
}

/// JWT secret stored in request extensions for the Claims extractor
#[derive(Clone)]
pub struct JwtSecret(pub Vec<u8>);
