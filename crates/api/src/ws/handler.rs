use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use playlistd_core::types::JobId;
use playlistd_events::JobPayload;
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

/// Messages a browser client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Subscribe to one download's notification room.
    Join { download_id: JobId },
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receiver).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Processes inbound messages (room joins) on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Greet the client so it knows the channel is live.
    send_json(
        &state,
        &conn_id,
        json!({ "type": "connected", "message": "Connected to server" }),
    )
    .await;

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Join { download_id }) => {
                    handle_join(&state, &conn_id, download_id).await;
                }
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring malformed client message");
                }
            },
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: remove connection and abort sender task.
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Put the connection into the download's room and bring it up to date.
///
/// If the job already reported progress, the last update is replayed so a
/// client that joined mid-download is not left staring at nothing until the
/// next throttled update arrives.
async fn handle_join(state: &AppState, conn_id: &str, download_id: JobId) {
    let room = download_id.to_string();
    if !state.ws_manager.join_room(conn_id, room.clone()).await {
        return;
    }
    tracing::debug!(conn_id = %conn_id, room = %room, "Client joined room");

    send_json(
        state,
        conn_id,
        json!({ "type": "joined", "message": format!("Joined room {room}") }),
    )
    .await;

    match state.progress.last(download_id).await {
        Some(update) => {
            if let Ok(text) = serde_json::to_string(&JobPayload::Progress(update)) {
                state
                    .ws_manager
                    .send_to(conn_id, Message::Text(text.into()))
                    .await;
            }
        }
        None => {
            send_json(
                state,
                conn_id,
                json!({
                    "type": "status",
                    "status": "starting",
                    "message": "Connected. Preparing download...",
                }),
            )
            .await;
        }
    }
}

/// Serialize a JSON value and send it to one connection.
async fn send_json(state: &AppState, conn_id: &str, payload: serde_json::Value) {
    state
        .ws_manager
        .send_to(conn_id, Message::Text(payload.to_string().into()))
        .await;
}
