use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::AppState;
use crate::error::ProxyError;

/// Extract the client key from `Authorization`, with or without a `Bearer ` prefix
fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).trim())
        .filter(|s| !s.is_empty())
}

/// Check a client key against the configured one in constant time
fn check_api_key(headers: &HeaderMap, expected: &str) -> Result<(), ProxyError> {
    let provided = extract_api_key(headers).ok_or(ProxyError::MissingApiKey)?;
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ProxyError::InvalidApiKey)
    }
}

/// Middleware guarding the provider route. A no-op when no key is configured.
pub async fn api_key_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    match check_api_key(request.headers(), expected) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!("Rejected request to {}: {err}", request.uri().path());
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(authorization));
        headers
    }

    #[test]
    fn test_extract_api_key() {
        assert_eq!(extract_api_key(&headers("Bearer abc")), Some("abc"));
        assert_eq!(extract_api_key(&headers("abc")), Some("abc"));
        assert_eq!(extract_api_key(&headers("Bearer ")), None);
        assert_eq!(extract_api_key(&HeaderMap::new()), None);
    }

    #[test]
    fn test_check_api_key() {
        assert!(check_api_key(&headers("Bearer relay-key"), "relay-key").is_ok());
        assert!(matches!(
            check_api_key(&headers("Bearer other"), "relay-key"),
            Err(ProxyError::InvalidApiKey)
        ));
        assert!(matches!(
            check_api_key(&HeaderMap::new(), "relay-key"),
            Err(ProxyError::MissingApiKey)
        ));
    }
}
