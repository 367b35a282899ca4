use std::sync::Arc;

use crate::auth::{CredentialResolver, JwtCredentialResolver};
use crate::tasks::TaskStore;
use crate::users::UserDirectory;
use crate::ws::{ConnectionRegistry, Dispatcher};

/// Access token lifetime used unless the config says otherwise.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Active WebSocket connections per user
    pub connections: Arc<ConnectionRegistry>,
    /// Event fan-out over `connections`
    pub dispatcher: Dispatcher,
    /// Resolves `?token=` on WebSocket upgrade
    pub credentials: Arc<dyn CredentialResolver>,
    /// HS256 secret for bearer tokens on REST routes
    pub jwt_secret: Vec<u8>,
    /// Lifetime of tokens handed out by guest login
    pub token_ttl_minutes: i64,
    /// Known accounts
    pub users: Arc<UserDirectory>,
    /// In-memory task records
    pub tasks: Arc<TaskStore>,
}

impl AppState {
    /// Fresh state whose WebSocket auth checks JWTs against the user directory.
    pub fn new(jwt_secret: Vec<u8>) -> Self {
        let users = Arc::new(UserDirectory::new());
        let credentials = Arc::new(JwtCredentialResolver::new(
            jwt_secret.clone(),
            users.clone(),
        ));
        Self::from_parts(users, credentials, jwt_secret)
    }

    /// Fresh state with a caller-supplied resolver for WebSocket auth.
    pub fn with_credentials(credentials: Arc<dyn CredentialResolver>, jwt_secret: Vec<u8>) -> Self {
        Self::from_parts(Arc::new(UserDirectory::new()), credentials, jwt_secret)
    }

    pub fn with_token_ttl(mut self, minutes: i64) -> Self {
        self.token_ttl_minutes = minutes;
        self
    }

    fn from_parts(
        users: Arc<UserDirectory>,
        credentials: Arc<dyn CredentialResolver>,
        jwt_secret: Vec<u8>,
    ) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        Self {
            dispatcher: Dispatcher::new(connections.clone()),
            connections,
            credentials,
            jwt_secret,
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            users,
            tasks: Arc::new(TaskStore::new()),
        }
    }
}
