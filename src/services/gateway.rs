//! Handshake gate: cookie → session token → verified identity, plus the connection gauge.

use axum::http::HeaderMap;
use axum_extra::headers::{Cookie, HeaderMapExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{PLAIN_SESSION_COOKIE, SECURE_SESSION_COOKIE};
use crate::error::AuthenticationError;
use crate::models::Identity;
use crate::services::session::SessionValidator;

/// Admits or refuses connections and counts the admitted ones.
#[derive(Clone)]
pub struct ConnectionGateway {
    validator: Arc<dyn SessionValidator>,
    connected: Arc<AtomicUsize>,
}

impl ConnectionGateway {
    pub fn new(validator: Arc<dyn SessionValidator>) -> Self {
        Self {
            validator,
            connected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Verify the handshake headers. Any failure refuses the connection.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthenticationError> {
        let token = match session_token(headers) {
            Ok(token) => token,
            Err(e) => {
                warn!(reason = %e, "handshake refused");
                return Err(e);
            }
        };

        match self.validator.validate_session(&token).await {
            Ok(identity) => {
                info!(user_id = %identity.user_id, user_name = %identity.user_name, "socket authenticated");
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "session validation failed");
                Err(AuthenticationError::InvalidSession)
            }
        }
    }

    /// Number of currently admitted connections.
    pub fn connected_count(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    /// Count a connection in; the returned guard counts it out when dropped.
    pub(crate) fn admit(&self) -> ConnectionGuard {
        let count = self.connected.fetch_add(1, Ordering::SeqCst) + 1;
        ConnectionGuard {
            connected: self.connected.clone(),
            count,
        }
    }
}

/// Held by a connection task for as long as the socket is connected.
pub(crate) struct ConnectionGuard {
    connected: Arc<AtomicUsize>,
    count: usize,
}

impl ConnectionGuard {
    /// Gauge value right after this connection was admitted.
    pub(crate) fn count_at_admit(&self) -> usize {
        self.count
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connected.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Pull the session token out of the `Cookie` header. The secure name wins when both are sent.
pub fn session_token(headers: &HeaderMap) -> Result<String, AuthenticationError> {
    let cookies = headers
        .typed_get::<Cookie>()
        .ok_or(AuthenticationError::InvalidCookies)?;
    cookies
        .get(SECURE_SESSION_COOKIE)
        .or_else(|| cookies.get(PLAIN_SESSION_COOKIE))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(AuthenticationError::TokenMissing)
}
