use std::sync::Arc;

use playlistd_core::progress::ProgressRegistry;
use playlistd_events::EventBus;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (download/static directories, bind address).
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients, grouped into rooms).
    pub ws_manager: Arc<WsManager>,
    /// Event bus job runners publish progress and status events on.
    pub event_bus: Arc<EventBus>,
    /// Last-seen progress per job, replayed to late room joiners.
    pub progress: Arc<ProgressRegistry>,
}
