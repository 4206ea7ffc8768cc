use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use secrecy::ExposeSecret;

use crate::api::AppState;

/// Check the `Authorization: Bearer` header against the configured admin
/// token. Routes stay closed when no token is configured.
///
/// # Errors
/// Returns `401 Unauthorized` for a missing, malformed or wrong token.
pub fn verify_admin_token(headers: &HeaderMap, state: &AppState) -> Result<(), StatusCode> {
    let expected = state.admin_token.as_ref().ok_or(StatusCode::UNAUTHORIZED)?;

    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = value
        .trim()
        .strip_prefix("Bearer ")
        .or_else(|| value.trim().strip_prefix("bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?
        .trim();

    if tokens_match(token.as_bytes(), expected.expose_secret().as_bytes()) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

// Compares every byte regardless of where the first mismatch is.
fn tokens_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
