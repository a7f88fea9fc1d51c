//! HTTP handlers: health and the online-users read surface.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use std::time::Duration;

use crate::error::AppError;
use crate::models::PresenceEntry;
use crate::services::{ConnectionGateway, EventRelay, PresenceService};

/// Engine.IO heartbeat and frame-size settings.
#[derive(Debug, Clone)]
pub struct SocketSettings {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub max_payload: u64,
    /// Log every inbound frame.
    pub debug: bool,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(20),
            max_payload: 1_000_000,
            debug: false,
        }
    }
}

/// Shared application state for HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: ConnectionGateway,
    pub presence_service: PresenceService,
    pub relay: EventRelay,
    pub socket: SocketSettings,
}

impl AppState {
    pub fn gateway(&self) -> &ConnectionGateway {
        &self.gateway
    }
    pub fn presence_service(&self) -> &PresenceService {
        &self.presence_service
    }
    pub fn relay(&self) -> &EventRelay {
        &self.relay
    }
}

/// GET /health: liveness probe with the connected-socket gauge.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "ticket-presence",
            "connected": state.gateway().connected_count()
        })),
    )
}

/// GET /api/online-users: live presence entries for dashboards.
pub async fn online_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<PresenceEntry>>, AppError> {
    let users = state.presence_service().online_users().await?;
    Ok(Json(users))
}
