//! Shared utilities for request/response transformations.

use std::borrow::Cow;

use axum::http::{HeaderMap, HeaderName, header};

use crate::constants::{HOP_BY_HOP_HEADERS, REASONING_CONTENT_KEY, REASONING_KEY};

/// Whether the `Content-Type` header names a JSON media type.
pub fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
}

/// Rename every `"reasoning"` key to `"reasoning_content"`.
///
/// Literal byte substitution, not a structural rewrite: the text may be a
/// fragment of JSON (a single SSE line). A string *value* that is exactly
/// `"reasoning"` is rewritten as well.
pub fn substitute_reasoning(text: &[u8]) -> Cow<'_, [u8]> {
    let Some(first) = find(text, REASONING_KEY) else {
        return Cow::Borrowed(text);
    };

    let mut out = Vec::with_capacity(text.len() + 8);
    let mut rest = text;
    let mut next = Some(first);
    while let Some(pos) = next {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(REASONING_CONTENT_KEY);
        rest = &rest[pos + REASONING_KEY.len()..];
        next = find(rest, REASONING_KEY);
    }
    out.extend_from_slice(rest);
    Cow::Owned(out)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}
