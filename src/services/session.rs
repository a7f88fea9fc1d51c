//! Session verification against the external auth endpoint.

use async_trait::async_trait;
use reqwest::{header::COOKIE, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::config::SessionCookieName;
use crate::error::{AppError, AppResult, SessionValidationError};
use crate::models::{Identity, SessionResponse};

/// Resolves a session token to the user it belongs to.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate_session(&self, token: &str) -> Result<Identity, SessionValidationError>;
}

/// Validator that asks the session endpoint on every call. No caching.
#[derive(Clone)]
pub struct HttpSessionValidator {
    client: Client,
    url: Option<String>,
    cookie: SessionCookieName,
}

impl HttpSessionValidator {
    pub fn new(url: Option<String>, cookie: SessionCookieName, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("session http client: {}", e)))?;
        Ok(Self { client, url, cookie })
    }
}

#[async_trait]
impl SessionValidator for HttpSessionValidator {
    async fn validate_session(&self, token: &str) -> Result<Identity, SessionValidationError> {
        let url = self
            .url
            .as_deref()
            .ok_or(SessionValidationError::NotConfigured)?;

        let response = self
            .client
            .get(url)
            .header(COOKIE, format!("{}={}", self.cookie.as_str(), token))
            .send()
            .await
            .map_err(SessionValidationError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SessionValidationError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(SessionValidationError::Body)?;
        let parsed: SessionResponse =
            serde_json::from_value(body).map_err(|_| SessionValidationError::MissingUser)?;
        let identity = parsed
            .user
            .filter(Identity::is_complete)
            .ok_or(SessionValidationError::MissingUser)?;

        debug!(user_id = %identity.user_id, "session verified");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(url: Option<String>) -> HttpSessionValidator {
        HttpSessionValidator::new(url, SessionCookieName::Plain, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn valid_session_returns_identity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/auth/session")
            .match_header("cookie", "next-auth.session-token=tok-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"user":{"user_id":"7","userName":"alice","roles":["admin"]}}"#)
            .create_async()
            .await;

        let identity = validator(Some(format!("{}/api/auth/session", server.url())))
            .validate_session("tok-1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(identity.user_id, "7");
        assert_eq!(identity.user_name, "alice");
        assert_eq!(identity.roles, vec!["admin".to_string()]);
    }

    #[tokio::test]
    async fn secure_cookie_name_in_production() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/session")
            .match_header("cookie", "__Secure-next-auth.session-token=tok-2")
            .with_status(200)
            .with_body(r#"{"user":{"user_id":1,"userName":"bob"}}"#)
            .create_async()
            .await;

        let validator = HttpSessionValidator::new(
            Some(format!("{}/session", server.url())),
            SessionCookieName::Secure,
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(validator.validate_session("tok-2").await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_url_is_not_configured() {
        let err = validator(None).validate_session("tok").await.unwrap_err();
        assert!(matches!(err, SessionValidationError::NotConfigured));
    }

    #[tokio::test]
    async fn non_200_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/session")
            .with_status(401)
            .with_body(r#"{"user":{"user_id":"7","userName":"alice"}}"#)
            .create_async()
            .await;

        let err = validator(Some(format!("{}/session", server.url())))
            .validate_session("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionValidationError::Status(401)));
    }

    #[tokio::test]
    async fn body_without_user_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/session")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let err = validator(Some(format!("{}/session", server.url())))
            .validate_session("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionValidationError::MissingUser));
    }

    #[tokio::test]
    async fn user_with_empty_name_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/session")
            .with_status(200)
            .with_body(r#"{"user":{"user_id":"7","userName":""}}"#)
            .create_async()
            .await;

        let err = validator(Some(format!("{}/session", server.url())))
            .validate_session("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionValidationError::MissingUser));
    }
}
