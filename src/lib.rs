//! Real-time presence and ticket event relay.
//!
//! Authenticates sockets against an external session endpoint, keeps a
//! TTL-backed record of who is online (Redis or in-process), and fans
//! ticket-lifecycle events out to every connected client over a
//! Socket.IO-compatible WebSocket.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod protocol;
pub mod repositories;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::{AppState, SocketSettings};
pub use services::presence::PresenceService;
pub use services::relay::EventRelay;

use axum::routing::get;
use handlers::http;

/// Build the router (socket endpoint, health, online users). Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/socket.io", get(handlers::ws_handler))
        .route("/socket.io/", get(handlers::ws_handler))
        .route("/health", get(http::health))
        .route("/api/online-users", get(http::online_users))
        .with_state(state)
}
