//! Integration tests: health, online users, socket handshake gating, CORS.
//!
//! Run with `cargo test`. The Redis presence test needs `TEST_REDIS_URL`
//! and is skipped otherwise.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use ticket_presence::error::SessionValidationError;
use ticket_presence::middleware::cors_layer;
use ticket_presence::models::{Identity, PresenceEntry};
use ticket_presence::repositories::{MemoryRepository, PresenceStore, RedisRepository};
use ticket_presence::services::{ConnectionGateway, SessionValidator};
use ticket_presence::{create_app, AppState, EventRelay, PresenceService, SocketSettings};
use tower::util::ServiceExt;

/// Accepts the token `valid` only.
struct FakeValidator;

#[async_trait]
impl SessionValidator for FakeValidator {
    async fn validate_session(&self, token: &str) -> Result<Identity, SessionValidationError> {
        if token == "valid" {
            Ok(Identity::new("42", "alice").with_roles(["agent"]))
        } else {
            Err(SessionValidationError::MissingUser)
        }
    }
}

fn test_state() -> AppState {
    let store: Arc<dyn PresenceStore> = Arc::new(MemoryRepository::new(Duration::from_secs(300)));
    AppState {
        gateway: ConnectionGateway::new(Arc::new(FakeValidator)),
        presence_service: PresenceService::new(store),
        relay: EventRelay::new(false),
        socket: SocketSettings::default(),
    }
}

async fn json_body(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn socket_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/socket.io/?EIO=4&transport=websocket");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = create_app(test_state());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("ok"));
    assert_eq!(json.get("connected").and_then(|v| v.as_u64()), Some(0));
}

#[tokio::test]
async fn online_users_lists_connected_identities() {
    let state = test_state();
    let identity = Identity::new("7", "bob").with_customer("acme");
    state.presence_service.connect(&identity, "sock-7").await.unwrap();
    let app = create_app(state.clone());

    let req = Request::builder().uri("/api/online-users").body(Body::empty()).unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let users: Vec<PresenceEntry> = serde_json::from_value(json_body(res).await).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_id, "7");
    assert_eq!(users[0].customer_id.as_deref(), Some("acme"));

    state.presence_service.disconnect(&identity).await.unwrap();
    let req = Request::builder().uri("/api/online-users").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    let users: Vec<PresenceEntry> = serde_json::from_value(json_body(res).await).unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn handshake_without_cookie_is_refused() {
    let state = test_state();
    let app = create_app(state.clone());
    let res = app.oneshot(socket_request(None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(res).await;
    assert_eq!(
        json.get("error").and_then(|v| v.as_str()),
        Some("Invalid or missing cookies")
    );
    assert_eq!(state.gateway.connected_count(), 0);
    assert!(state.presence_service.online_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn handshake_without_session_token_is_refused() {
    let app = create_app(test_state());
    let res = app.oneshot(socket_request(Some("theme=dark"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(res).await;
    assert_eq!(json.get("error").and_then(|v| v.as_str()), Some("Session token missing"));
}

#[tokio::test]
async fn handshake_with_rejected_session_is_refused() {
    let app = create_app(test_state());
    let res = app
        .oneshot(socket_request(Some("next-auth.session-token=stale")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(res).await;
    assert_eq!(json.get("error").and_then(|v| v.as_str()), Some("Invalid session"));
}

#[tokio::test]
async fn valid_session_passes_the_gate() {
    let app = create_app(test_state());
    // no upgrade headers: authentication succeeds, then the upgrade itself is rejected
    let res = app
        .oneshot(socket_request(Some("__Secure-next-auth.session-token=valid")))
        .await
        .unwrap();
    assert_ne!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.status().is_client_error());
}

#[tokio::test]
async fn polling_transport_is_rejected() {
    let app = create_app(test_state());
    let req = Request::builder()
        .uri("/socket.io/?EIO=4&transport=polling")
        .header(header::COOKIE, "next-auth.session-token=valid")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cors_allows_configured_origin_with_credentials() {
    let app = create_app(test_state()).layer(cors_layer("http://localhost:3000").unwrap());
    let req = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(
        res.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
    assert_eq!(
        res.headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn redis_presence_round_trip() {
    let redis_url = match std::env::var("TEST_REDIS_URL") {
        Ok(u) => u,
        Err(_) => {
            eprintln!("Skip redis test: set TEST_REDIS_URL");
            return;
        }
    };
    let repo = match RedisRepository::connect(&redis_url, Duration::from_secs(2)).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Skip redis test: {}", e);
            return;
        }
    };

    let user_id = format!(
        "it-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis()
    );
    let identity = Identity::new(user_id.clone(), "redis-user")
        .with_roles(["agent"])
        .with_customer("acme");
    let entry = PresenceEntry::connected(&identity, "sock-r");

    repo.add_online_user(&user_id, &entry).await.unwrap();
    let online = repo.get_online_users().await.unwrap();
    assert!(online.iter().any(|e| e.user_id == user_id));
    assert!(repo.update_last_seen(&user_id).await.unwrap());
    assert!(repo
        .online_user_ids_in("online_by_role:agent")
        .await
        .unwrap()
        .contains(&user_id));

    repo.remove_online_user(&user_id, Some(&entry.context())).await.unwrap();
    let online = repo.get_online_users().await.unwrap();
    assert!(!online.iter().any(|e| e.user_id == user_id));

    repo.add_online_user(&user_id, &entry).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let online = repo.get_online_users().await.unwrap();
    assert!(!online.iter().any(|e| e.user_id == user_id));
}
