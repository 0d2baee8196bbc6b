use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header required")]
    MissingHeader,
    #[error("Invalid authorization header format")]
    InvalidFormat,
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    match auth_header.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => Ok(token),
        _ => Err(AuthError::InvalidFormat),
    }
}

/// Gate a route on a valid bearer token.
///
/// On success the verified [`Claims`](super::Claims) are attached to the
/// request as an extension for handlers to pick up with `Extension<Claims>`.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?.to_string();
    let claims = state.provisioning.verify_only(&token).await?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_valid() {
        let headers = headers_with_auth("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_token_missing_header() {
        assert_eq!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingHeader));
    }

    #[test]
    fn test_bearer_token_basic_auth() {
        let headers = headers_with_auth("Basic dXNlcjpwYXNz");
        assert_eq!(bearer_token(&headers), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_bearer_token_scheme_is_case_sensitive() {
        let headers = headers_with_auth("bearer abc");
        assert_eq!(bearer_token(&headers), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_bearer_token_without_token() {
        assert_eq!(bearer_token(&headers_with_auth("Bearer")), Err(AuthError::InvalidFormat));
        assert_eq!(bearer_token(&headers_with_auth("Bearer ")), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_bearer_token_extra_parts() {
        let headers = headers_with_auth("Bearer abc def");
        assert_eq!(bearer_token(&headers), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(AuthError::MissingHeader.to_string(), "Authorization header required");
        assert_eq!(
            AuthError::InvalidFormat.to_string(),
            "Invalid authorization header format"
        );
    }
}
