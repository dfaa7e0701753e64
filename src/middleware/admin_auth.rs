// src/middleware/admin_auth.rs

use crate::{error::AppError, state::AppState};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, warn};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Constant-time string comparison to prevent timing attacks
fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }
    result == 0
}

/// Token presented by the caller: `Authorization: Bearer <t>` or
/// `x-admin-token: <t>`.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| {
            headers
                .get(ADMIN_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
        })
        .map(str::trim)
}

/// Guards the key-mutating endpoints.
///
/// Open when no admin token is configured, matching a local deployment of the
/// service; otherwise the caller must present the token.
pub async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let expected = match state.config.server.admin_token.as_ref() {
        Some(token) if !token.expose_secret().is_empty() => token.expose_secret(),
        _ => {
            debug!("No admin token configured; admin endpoint is open");
            return Ok(next.run(req).await);
        }
    };

    let authorized = matches!(
        presented_token(req.headers()),
        Some(token) if secure_compare(token, expected)
    );
    if authorized {
        debug!("Admin authentication successful");
        Ok(next.run(req).await)
    } else {
        warn!(path = %req.uri().path(), "Admin authentication failed: invalid or missing token");
        Err(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn compare_requires_exact_match() {
        assert!(secure_compare("token", "token"));
        assert!(!secure_compare("token", "tokem"));
        assert!(!secure_compare("token", "token2"));
    }

    #[test]
    fn bearer_takes_precedence_over_custom_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(presented_token(&headers), Some("abc"));

        headers.remove(header::AUTHORIZATION);
        assert_eq!(presented_token(&headers), Some("xyz"));

        assert_eq!(presented_token(&HeaderMap::new()), None);
    }
}
