//! CORS for the socket endpoint. Credentials are always allowed, so origins are explicit.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::AppError;

/// Build the CORS layer from `SOCKET_CORS_ORIGIN`: `*` mirrors the request origin,
/// otherwise a comma-separated list of exact origins.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, AppError> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::mirror_request()
    } else {
        let origins = origin
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|_| AppError::Internal(anyhow::anyhow!("invalid CORS origin {}", o)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]))
}
