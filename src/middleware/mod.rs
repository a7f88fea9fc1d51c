//! HTTP middleware. Socket authentication happens in the gateway before the WebSocket upgrade.

pub mod cors;

pub use cors::cors_layer;
