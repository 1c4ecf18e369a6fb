//! Per-request orchestration of the upstream gateway.
//!
//! classify → rewrite → forward → transform → write. Streaming calls go
//! upstream directly so the body stays live; everything else goes through
//! the capturing reverse-proxy path and is rewritten before the client sees
//! a single byte.

use axum::{
    extract::{Request, State},
    http::{Uri, Version},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::AppState;
use crate::constants::PROVIDER_ROUTE_PREFIX;
use crate::error::ProxyError;
use crate::transforms::{
    Classified, Exchange, StreamOptions, classify, ensure_flushable, rewrite_buffered_response,
    rewrite_request, stream_response,
};
use crate::upstream::{self, OutboundBody, OutboundRequest};

pub async fn forward(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let client_version = request.version();

    let classified = match classify(request, state.max_body_bytes).await {
        Ok(c) => c,
        Err(err) => {
            tracing::error!("{err}");
            return err.into_response();
        }
    };
    let exchange = classified.exchange;

    let mut outbound = outbound_request(classified);
    rewrite_request(&mut outbound, &state.proxy, &state.mapper);

    match exchange {
        Exchange::Streaming => relay_stream(&state, outbound, client_version).await,
        Exchange::Buffered => relay_buffered(&state, outbound).await,
    }
}

async fn relay_stream(state: &AppState, outbound: OutboundRequest, version: Version) -> Response {
    if let Err(err) = ensure_flushable(version) {
        tracing::error!("Cannot stream to {version:?} client: {err}");
        return err.into_response();
    }

    let upstream_response =
        match upstream::send(&state.http_client, outbound, state.proxy.debug).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Failed to contact upstream: {e}");
                return ProxyError::Upstream(e).into_response();
            }
        };

    stream_response(
        upstream_response,
        StreamOptions {
            enable_reasoning: state.proxy.enable_reasoning,
            debug: state.proxy.debug,
        },
    )
}

async fn relay_buffered(state: &AppState, outbound: OutboundRequest) -> Response {
    let mut captured =
        match upstream::forward_buffered(&state.http_client, outbound, state.proxy.debug).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to contact upstream: {e}");
                return ProxyError::Upstream(e).into_response();
            }
        };

    rewrite_buffered_response(&mut captured);
    captured.into_response()
}

/// Turn a classified client request into an upstream-bound candidate with the
/// provider prefix stripped from its path.
fn outbound_request(classified: Classified) -> OutboundRequest {
    let Classified {
        request, peeked, ..
    } = classified;
    let (parts, body) = request.into_parts();

    let body = match peeked {
        Some(bytes) => OutboundBody::Buffered(bytes),
        None => OutboundBody::Passthrough(body),
    };

    OutboundRequest {
        method: parts.method,
        uri: strip_provider_prefix(&parts.uri),
        headers: parts.headers,
        body,
    }
}

fn strip_provider_prefix(uri: &Uri) -> Uri {
    let path = uri
        .path()
        .strip_prefix(PROVIDER_ROUTE_PREFIX)
        .unwrap_or(uri.path());
    let path = if path.is_empty() { "/" } else { path };
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    path_and_query.parse().unwrap_or_else(|e| {
        tracing::error!("Failed to strip route prefix from {uri}: {e}");
        Uri::from_static("/")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_provider_prefix() {
        assert_eq!(
            strip_provider_prefix(&Uri::from_static("/api/deepseek/chat/completions")),
            "/chat/completions"
        );
        assert_eq!(
            strip_provider_prefix(&Uri::from_static("/api/deepseek/models?page=2")),
            "/models?page=2"
        );
        assert_eq!(strip_provider_prefix(&Uri::from_static("/api/deepseek")), "/");
    }
}
