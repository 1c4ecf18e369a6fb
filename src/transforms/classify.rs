//! Streaming intent detection.
//!
//! The inbound body can only be read once, so the classifier peeks: it reads
//! the bytes, decodes the `stream` flag from them, and hands back a request
//! rebuilt around the very same bytes.

use axum::{
    body::{Body, to_bytes},
    extract::Request,
};
use bytes::Bytes;
use serde::Deserialize;

use super::common::is_json_content;
use crate::error::ProxyError;

/// Shape of exchange the client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// `"stream": true`: relay Server-Sent Events line by line
    Streaming,
    /// Anything else: capture the upstream response and rewrite it whole
    Buffered,
}

/// A classified request whose body is intact for the next stage.
pub struct Classified {
    pub request: Request,
    pub exchange: Exchange,
    /// The peeked body, when one was read (JSON content types only)
    pub peeked: Option<Bytes>,
}

#[derive(Deserialize)]
struct StreamIntent {
    #[serde(default)]
    stream: bool,
}

/// Determine whether the client asked for a streamed response.
///
/// Non-JSON requests are never read. JSON bodies that do not parse are
/// classified as buffered and forwarded untouched. Only a failure to read the
/// inbound body itself is returned as an error, since the bytes are lost.
pub async fn classify(request: Request, max_body_bytes: usize) -> Result<Classified, ProxyError> {
    if !is_json_content(request.headers()) {
        return Ok(Classified {
            request,
            exchange: Exchange::Buffered,
            peeked: None,
        });
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| ProxyError::RequestBody(e.to_string()))?;

    let exchange = stream_intent(&bytes);
    let request = Request::from_parts(parts, Body::from(bytes.clone()));

    Ok(Classified {
        request,
        exchange,
        peeked: Some(bytes),
    })
}

/// Decode the `stream` flag from a JSON body.
pub fn stream_intent(body: &[u8]) -> Exchange {
    match serde_json::from_slice::<StreamIntent>(body) {
        Ok(StreamIntent { stream: true }) => Exchange::Streaming,
        Ok(_) => Exchange::Buffered,
        Err(e) => {
            tracing::error!("Failed to decode stream flag from request body: {e}");
            Exchange::Buffered
        }
    }
}
