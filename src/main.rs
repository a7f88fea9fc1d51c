//! Entry point: load config, wire dependencies, and run the socket server.

use std::sync::Arc;
use ticket_presence::config::Config;
use ticket_presence::middleware::cors_layer;
use ticket_presence::repositories::{MemoryRepository, PresenceStore, RedisRepository};
use ticket_presence::services::{ConnectionGateway, HttpSessionValidator, SessionValidator};
use ticket_presence::{create_app, telemetry, AppState, EventRelay, PresenceService, SocketSettings};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    telemetry::init_tracing(&config)?;

    if config.session_url.is_none() {
        tracing::warn!("NEXT_AUTH_SESSION_URL is not set; every handshake will be refused");
    }

    let store: Arc<dyn PresenceStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisRepository::connect(url, config.presence_ttl).await?),
        None => {
            tracing::warn!("REDIS_URL is not set; presence is kept in process memory");
            Arc::new(MemoryRepository::new(config.presence_ttl))
        }
    };
    let validator: Arc<dyn SessionValidator> = Arc::new(HttpSessionValidator::new(
        config.session_url.clone(),
        config.session_cookie,
        config.session_timeout,
    )?);

    let state = AppState {
        gateway: ConnectionGateway::new(validator),
        presence_service: PresenceService::new(store),
        relay: EventRelay::new(config.debug),
        socket: SocketSettings {
            ping_interval: config.ping_interval,
            debug: config.debug,
            ..SocketSettings::default()
        },
    };

    let app = create_app(state)
        .layer(cors_layer(&config.cors_origin)?)
        .layer(TraceLayer::new_for_http());

    tracing::info!(
        addr = %config.server_addr,
        environment = ?config.environment,
        cookie = config.session_cookie.as_str(),
        "listening"
    );
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
