//! Application configuration loaded from environment.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Cookie carrying the session token in production and staging.
pub const SECURE_SESSION_COOKIE: &str = "__Secure-next-auth.session-token";
/// Cookie carrying the session token everywhere else.
pub const PLAIN_SESSION_COOKIE: &str = "next-auth.session-token";

/// Deployment environment, taken from `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn is_deployed(&self) -> bool {
        matches!(self, Environment::Production | Environment::Staging)
    }
}

/// Which session cookie name outbound verification requests carry.
/// Resolved once at startup from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCookieName {
    Secure,
    Plain,
}

impl SessionCookieName {
    pub fn for_environment(env: Environment) -> Self {
        if env.is_deployed() {
            SessionCookieName::Secure
        } else {
            SessionCookieName::Plain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionCookieName::Secure => SECURE_SESSION_COOKIE,
            SessionCookieName::Plain => PLAIN_SESSION_COOKIE,
        }
    }
}

/// Application configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address, `0.0.0.0:<PORT>`.
    pub server_addr: SocketAddr,
    /// Origin allowed to open sockets (`SOCKET_CORS_ORIGIN`). `*` mirrors the request origin.
    pub cors_origin: String,
    /// Session verification endpoint (`NEXT_AUTH_SESSION_URL`).
    pub session_url: Option<String>,
    pub environment: Environment,
    pub session_cookie: SessionCookieName,
    /// Verbose per-event logging.
    pub debug: bool,
    /// Redis URL for presence. `None` keeps presence in process memory.
    pub redis_url: Option<String>,
    /// Presence entry lifetime. Must exceed `ping_interval` so pongs refresh entries in time.
    pub presence_ttl: Duration,
    /// Engine.IO ping cadence (`PING_INTERVAL_SECS`).
    pub ping_interval: Duration,
    pub session_timeout: Duration,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigLoadError::InvalidPort(raw))?,
            None => 3001,
        };
        let server_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let cors_origin =
            lookup("SOCKET_CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let session_url = lookup("NEXT_AUTH_SESSION_URL").filter(|u| !u.trim().is_empty());
        let environment = Environment::from_name(
            &lookup("NODE_ENV").unwrap_or_else(|| "development".to_string()),
        );
        let debug = lookup("DEBUG").map(|v| parse_flag(&v)).unwrap_or(false);
        let redis_url = lookup("REDIS_URL").filter(|u| !u.trim().is_empty());
        let presence_ttl = Duration::from_secs(parse_secs(&lookup, "PRESENCE_TTL_SECS", 300)?);
        let ping_interval = Duration::from_secs(parse_secs(&lookup, "PING_INTERVAL_SECS", 25)?);
        if presence_ttl <= ping_interval {
            return Err(ConfigLoadError::PresenceTtlTooShort {
                ttl_secs: presence_ttl.as_secs(),
                ping_interval_secs: ping_interval.as_secs(),
            });
        }
        let session_timeout =
            Duration::from_secs(parse_secs(&lookup, "SESSION_TIMEOUT_SECS", 10)?);
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            server_addr,
            cors_origin,
            session_url,
            environment,
            session_cookie: SessionCookieName::for_environment(environment),
            debug,
            redis_url,
            presence_ttl,
            ping_interval,
            session_timeout,
            log_level,
        })
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigLoadError::InvalidDuration { key, value: raw }),
        },
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid PORT: {0}")]
    InvalidPort(String),
    #[error("Invalid {key}: {value} (expected a positive number of seconds)")]
    InvalidDuration { key: &'static str, value: String },
    #[error("PRESENCE_TTL_SECS ({ttl_secs}) must be greater than PING_INTERVAL_SECS ({ping_interval_secs})")]
    PresenceTtlTooShort {
        ttl_secs: u64,
        ping_interval_secs: u64,
    },
}
