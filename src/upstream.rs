//! Forwarding to the upstream provider.
//!
//! Two ways out:
//! - `send`: issue the request and hand back the live `reqwest::Response`
//!   (used by the streaming path so the body stays a stream)
//! - `forward_buffered`: generic reverse proxying that captures status,
//!   headers and body before anything reaches the client

use axum::{
    body::Body,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::TryStreamExt;
use reqwest::Client;

use crate::transforms::common::strip_hop_by_hop;

/// Body of an upstream-bound request.
pub enum OutboundBody {
    /// Fully read (peeked) body, eligible for rewriting
    Buffered(Bytes),
    /// Body forwarded as-is without ever being read by the gateway
    Passthrough(Body),
}

/// A request on its way upstream. Starts out with the client's relative
/// path and is retargeted by `transforms::rewrite_request`.
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: OutboundBody,
}

/// Upstream response captured in full by the buffered path.
#[derive(Debug)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for CapturedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Send a request upstream and return the live response.
pub async fn send(
    client: &Client,
    request: OutboundRequest,
    debug: bool,
) -> Result<reqwest::Response, reqwest::Error> {
    if debug {
        dump_request(&request);
    }

    let OutboundRequest {
        method,
        uri,
        headers,
        body,
    } = request;

    let body = match body {
        OutboundBody::Buffered(bytes) => reqwest::Body::from(bytes),
        OutboundBody::Passthrough(body) => {
            let data_stream = body
                .into_data_stream()
                .map_err(|e| std::io::Error::other(e.to_string()));
            reqwest::Body::wrap_stream(data_stream)
        }
    };

    client
        .request(method, uri.to_string())
        .headers(headers)
        .body(body)
        .send()
        .await
}

/// Forward a request and capture the whole upstream response locally.
///
/// Hop-by-hop headers are dropped from the captured headers, since the
/// captured body is re-framed when it is written to the client.
pub async fn forward_buffered(
    client: &Client,
    request: OutboundRequest,
    debug: bool,
) -> Result<CapturedResponse, reqwest::Error> {
    let response = send(client, request, debug).await?;

    let status = response.status();
    let mut headers = response.headers().clone();
    strip_hop_by_hop(&mut headers);
    let body = response.bytes().await?;

    let captured = CapturedResponse {
        status,
        headers,
        body,
    };
    if debug {
        dump_response(&captured);
    }
    Ok(captured)
}

fn dump_request(request: &OutboundRequest) {
    let body = match &request.body {
        OutboundBody::Buffered(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        OutboundBody::Passthrough(_) => "<streamed body>".to_string(),
    };
    tracing::info!(
        "Request:\n{} {}\n{}\n{}",
        request.method,
        request.uri,
        format_headers(&request.headers),
        body
    );
}

fn dump_response(response: &CapturedResponse) {
    tracing::info!(
        "Response:\n{}\n{}\n{}",
        response.status,
        format_headers(&response.headers),
        String::from_utf8_lossy(&response.body)
    );
}

fn format_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value.to_str().unwrap_or("<binary>")))
        .collect::<Vec<_>>()
        .join("\n")
}
