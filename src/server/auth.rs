//! Bearer token gate for the publish routes
//!
//! Applied as a route layer so the broadcast core never sees credentials.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::state::RelayState;

/// Why a request was refused by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no publish token configured")]
    NotConfigured,
    #[error("missing Authorization header")]
    MissingCredential,
    #[error("Authorization header is not a bearer token")]
    Malformed,
    #[error("invalid token")]
    InvalidToken,
}

/// Check the `Authorization: Bearer <token>` header against `expected`
pub fn check_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AuthError> {
    let expected = expected.ok_or(AuthError::NotConfigured)?;

    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed);
    }

    if constant_time_eq(token.trim().as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Middleware rejecting requests without a valid token
pub async fn require_token(
    State(state): State<Arc<RelayState>>,
    request: Request,
    next: Next,
) -> Response {
    match check_bearer(request.headers(), state.config.auth_token.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "Publish rejected");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}
