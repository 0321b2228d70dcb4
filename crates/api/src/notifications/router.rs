//! Event-to-room routing engine.
//!
//! [`NotificationRouter`] subscribes to the job event bus and forwards each
//! event to the WebSocket room named after its job id. Clients that never
//! joined the room simply never hear about the job.

use std::sync::Arc;

use axum::extract::ws::Message;
use playlistd_events::JobEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Routes job events to their rooms.
pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    /// Create a new router delivering through the given WebSocket manager.
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the main routing loop.
    ///
    /// Subscribes to the event bus via `receiver` and processes each event.
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](playlistd_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.route_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver a single event to its room.
    async fn route_event(&self, event: &JobEvent) {
        let room = event.job_id.to_string();
        match serde_json::to_string(&event.payload) {
            Ok(text) => {
                let delivered = self
                    .ws_manager
                    .send_to_room(&room, Message::Text(text.into()))
                    .await;
                tracing::trace!(room = %room, delivered, "Routed job event");
            }
            Err(e) => {
                tracing::error!(room = %room, error = %e, "Failed to serialize job event");
            }
        }
    }
}
