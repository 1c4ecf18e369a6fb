//! Line-by-line relay of Server-Sent Event responses.
//!
//! The relayed body is a pull-based stream: the next upstream read only
//! happens once the connection has taken the previous line. A client that
//! disconnects drops the body, which drops the upstream response with it.

use std::borrow::Cow;

use async_stream::stream;
use axum::{
    body::Body,
    http::{HeaderValue, Version, header},
    response::Response,
};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use super::common::{strip_hop_by_hop, substitute_reasoning};
use crate::constants::{EVENT_STREAM_CONTENT_TYPE, SSE_DATA_PREFIX};
use crate::error::ProxyError;

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    /// Rename `"reasoning"` keys in `data:` lines
    pub enable_reasoning: bool,
    /// Log every relayed line
    pub debug: bool,
}

/// Fail fast when the client connection cannot take incrementally flushed chunks.
///
/// HTTP/1.0 and older have no chunked framing, so per-line delivery is not
/// possible there.
pub fn ensure_flushable(version: Version) -> Result<(), ProxyError> {
    if version == Version::HTTP_09 || version == Version::HTTP_10 {
        return Err(ProxyError::StreamingUnsupported);
    }
    Ok(())
}

/// Build the client response for a streamed upstream response.
///
/// Upstream status and headers are kept, except framing headers, and the
/// event-stream content type plus no-cache/keep-alive are forced.
pub fn stream_response(upstream: reqwest::Response, options: StreamOptions) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

    if options.debug {
        tracing::info!("Relaying event stream, upstream status {status}");
    }

    let body = Body::from_stream(rewrite_event_stream(upstream.bytes_stream(), options));
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Split an upstream byte stream into lines and yield each rewritten line
/// (newline-terminated) as its own frame.
///
/// A trailing `\r` is dropped from each line. A final line without a newline
/// is still delivered. An upstream error is logged and ends the stream with
/// that error; lines already yielded stand.
pub fn rewrite_event_stream<S, E>(
    upstream: S,
    options: StreamOptions,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    stream! {
        let mut upstream = std::pin::pin!(upstream);
        let mut buffer = BytesMut::new();

        loop {
            // Drain complete lines before asking upstream for more
            if let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let line = buffer.split_to(newline_pos + 1);
                yield Ok(frame(trim_line_end(&line), options));
                continue;
            }

            match upstream.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    tracing::error!("Upstream event stream failed: {e}");
                    yield Err(std::io::Error::other(e));
                    return;
                }
                None => break,
            }
        }

        if !buffer.is_empty() {
            yield Ok(frame(trim_line_end(&buffer), options));
        }
    }
}

/// Rewrite a single SSE line (without its terminator).
pub fn transform_line(line: &[u8], enable_reasoning: bool) -> Cow<'_, [u8]> {
    if enable_reasoning && line.starts_with(SSE_DATA_PREFIX) {
        substitute_reasoning(line)
    } else {
        Cow::Borrowed(line)
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn frame(line: &[u8], options: StreamOptions) -> Bytes {
    let line = transform_line(line, options.enable_reasoning);
    if options.debug {
        tracing::info!("SSE: {}", String::from_utf8_lossy(&line));
    }
    let mut out = BytesMut::with_capacity(line.len() + 1);
    out.extend_from_slice(&line);
    out.extend_from_slice(b"\n");
    out.freeze()
}
