//! Request/response transformations for the upstream gateway.
//!
//! This module provides:
//! - `common`: Shared utilities (reasoning key substitution, JSON detection, hop-by-hop headers)
//! - `model_map`: Caller-facing → upstream model names
//! - `classify`: Non-destructive streaming intent detection
//! - `rewrite`: Outbound request rewriting
//! - `buffered`: Rewriting of captured non-streaming responses
//! - `streaming`: Line-by-line SSE relay

pub mod buffered;
pub mod classify;
pub mod common;
pub mod model_map;
pub mod rewrite;
pub mod streaming;

// Re-export commonly used items
pub use buffered::rewrite_buffered_response;
pub use classify::{Classified, Exchange, classify};
pub use model_map::ModelMapper;
pub use rewrite::rewrite_request;
pub use streaming::{StreamOptions, ensure_flushable, stream_response};
