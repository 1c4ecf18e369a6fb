//! Rewrite a fully captured (non-streaming) upstream response.

use std::borrow::Cow;

use axum::http::{HeaderValue, header};
use bytes::Bytes;

use super::common::{is_json_content, substitute_reasoning};
use crate::upstream::CapturedResponse;

/// Rename `"reasoning"` keys in a JSON response body and fix up `Content-Length`.
///
/// Non-JSON responses are left exactly as captured.
pub fn rewrite_buffered_response(response: &mut CapturedResponse) {
    if !is_json_content(&response.headers) {
        return;
    }

    let rewritten = match substitute_reasoning(&response.body) {
        Cow::Owned(bytes) => Some(Bytes::from(bytes)),
        Cow::Borrowed(_) => None,
    };
    if let Some(body) = rewritten {
        response.body = body;
    }
    response
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(response.body.len()));
}
