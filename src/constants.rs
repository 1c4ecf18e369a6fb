/// Route prefix under which every request is forwarded upstream (stripped before forwarding)
pub const PROVIDER_ROUTE_PREFIX: &str = "/api/deepseek";

/// Attribution header carrying the configured ranking title
pub const RANKINGS_TITLE_HEADER: &str = "x-title";

/// Attribution header carrying the configured ranking URL
pub const RANKINGS_URL_HEADER: &str = "http-referer";

/// Request body field holding the model identifier
pub const MODEL_FIELD: &str = "model";

/// Request body field asking the upstream to return reasoning tokens
pub const INCLUDE_REASONING_FIELD: &str = "include_reasoning";

/// Field key as emitted by the upstream (quoted, matched literally)
pub const REASONING_KEY: &[u8] = br#""reasoning""#;

/// Field key as expected by clients (quoted, written literally)
pub const REASONING_CONTENT_KEY: &[u8] = br#""reasoning_content""#;

/// SSE data line marker
pub const SSE_DATA_PREFIX: &[u8] = b"data:";

/// Media type forced onto streamed responses
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Default inbound body limit for the stream classifier (32 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Hop-by-hop headers a reverse proxy must not forward in either direction
pub static HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];
