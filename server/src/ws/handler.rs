use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::AuthError;
use crate::state::AppState;
use crate::ws::{actor, UserId};

/// Query parameters for WebSocket connection.
/// Auth is via query param ?token=JWT.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// Close code for every refused credential (1008, policy violation).
pub const CLOSE_AUTH_FAILED: u16 = close_code::POLICY;

/// GET /ws?token=JWT
/// WebSocket upgrade endpoint. Authenticates via query parameter.
/// On auth failure, upgrades then immediately closes with 1008 and a reason
/// naming the failure; nothing is registered.
/// On success, spawns an actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let resolved = match params.token.as_deref() {
        None | Some("") => Err(AuthError::MissingToken),
        Some(token) => state.credentials.resolve_credential(token).await,
    };

    match resolved {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, "WebSocket connection authenticated");
            ws.on_upgrade(move |socket| handle_authenticated(socket, state, user_id))
        }
        Err(err) => {
            let reason = err.close_reason();
            tracing::warn!(
                close_code = CLOSE_AUTH_FAILED,
                reason = reason,
                error = %err,
                "WebSocket auth failed"
            );

            // Upgrade the connection, then immediately close with the error code
            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: CLOSE_AUTH_FAILED,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}

/// Handle an authenticated WebSocket connection by running the actor.
async fn handle_authenticated(socket: WebSocket, state: AppState, user_id: UserId) {
    actor::run_connection(socket, state, user_id).await;
}
