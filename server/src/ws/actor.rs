use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws::UserId;

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: waits for inbound frames until the peer goes away
///
/// The mpsc sender is what gets registered, so the dispatcher can push to
/// this client from any task. Registration queues the presence snapshot
/// before anything else can reach the channel.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: UserId) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let connection_id = state.dispatcher.connect(user_id, tx);

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket actor started"
    );

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Reader loop: inbound payloads carry no meaning yet and are discarded
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    tracing::debug!(
                        user_id = %user_id,
                        "Ignoring client text message: {}",
                        text.as_str().chars().take(100).collect::<String>()
                    );
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        user_id = %user_id,
                        bytes = data.len(),
                        "Ignoring client binary message"
                    );
                }
                // tungstenite queues the pong reply itself
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                // Stream ended: client disconnected
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();

    // Remove this channel only; other sessions of the same user stay registered
    state.dispatcher.disconnect(user_id, connection_id);

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed, connection is broken
            break;
        }
    }
}
