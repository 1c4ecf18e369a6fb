//! Rewrite a client request for the upstream provider.
//!
//! Applied in order:
//! 1. Retarget scheme/host/path onto the configured base URL
//! 2. Set `Host` to the upstream host
//! 3. Attribution headers (`X-Title`, `HTTP-Referer`) when configured
//! 4. Upstream `Authorization: Bearer` when a key is configured
//! 5. JSON bodies: model mapping, `include_reasoning` injection, exact `Content-Length`

use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri, header};
use bytes::Bytes;
use serde_json::{Map, Value};
use url::Url;

use super::common::{is_json_content, strip_hop_by_hop};
use super::model_map::ModelMapper;
use crate::config::ProxyConfig;
use crate::constants::{
    INCLUDE_REASONING_FIELD, MODEL_FIELD, RANKINGS_TITLE_HEADER, RANKINGS_URL_HEADER,
};
use crate::upstream::{OutboundBody, OutboundRequest};

pub fn rewrite_request(request: &mut OutboundRequest, config: &ProxyConfig, mapper: &ModelMapper) {
    tracing::debug!("Rewriting request: {} {}", request.method, request.uri.path());

    retarget(request, &config.base_url);

    let headers = &mut request.headers;
    strip_hop_by_hop(headers);
    // Identity encoding keeps upstream bodies open to literal substitution
    headers.remove(header::ACCEPT_ENCODING);

    set_header(headers, header::HOST, &host_header(&config.base_url));
    if let Some(title) = &config.rankings_title {
        set_header(headers, HeaderName::from_static(RANKINGS_TITLE_HEADER), title);
    }
    if let Some(url) = &config.rankings_url {
        set_header(headers, HeaderName::from_static(RANKINGS_URL_HEADER), url);
    }
    if let Some(key) = &config.api_key {
        set_header(headers, header::AUTHORIZATION, &format!("Bearer {key}"));
    }

    if let OutboundBody::Buffered(body) = &mut request.body
        && is_json_content(&request.headers)
    {
        if let Some(rewritten) = rewrite_json_body(body, mapper, config.enable_reasoning) {
            *body = rewritten;
        }
        request
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
}

/// Point the request at the upstream, keeping its path under the base path.
fn retarget(request: &mut OutboundRequest, base_url: &Url) {
    let mut target = base_url.clone();
    target.set_path(&join_paths(base_url.path(), request.uri.path()));
    target.set_query(request.uri.query());
    target.set_fragment(None);

    if !stays_under(target.path(), base_url.path()) {
        tracing::error!(
            "Refusing to retarget {} outside upstream base path {}",
            request.uri.path(),
            base_url.path()
        );
        target.set_path(base_url.path());
    }

    match target.as_str().parse::<Uri>() {
        Ok(uri) => request.uri = uri,
        Err(e) => tracing::error!("Failed to retarget request to {target}: {e}"),
    }
}

/// Join the upstream base path with the client path, normalizing slashes.
///
/// `..` in the client path cannot climb out of the base path. Percent-encoded
/// dot segments (`%2e%2e`, `.%2E`, ...) count as dots, since the URL parser
/// resolves them the same way.
pub fn join_paths(base: &str, path: &str) -> String {
    let mut segments: Vec<&str> = base
        .split('/')
        .filter(|s| !s.is_empty() && dot_segment(s) != Some(DotSegment::Current))
        .collect();
    let floor = segments.len();

    for segment in path.split('/') {
        match dot_segment(segment) {
            Some(DotSegment::Current) => {}
            Some(DotSegment::Parent) => {
                if segments.len() > floor {
                    segments.pop();
                }
            }
            None if segment.is_empty() => {}
            None => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DotSegment {
    Current,
    Parent,
}

fn dot_segment(segment: &str) -> Option<DotSegment> {
    let lower = segment.to_ascii_lowercase();
    match lower.as_str() {
        "." | "%2e" => Some(DotSegment::Current),
        ".." | ".%2e" | "%2e." | "%2e%2e" => Some(DotSegment::Parent),
        _ => None,
    }
}

fn stays_under(path: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    base.is_empty() || path == base || path.starts_with(&format!("{base}/"))
}

fn host_header(base_url: &Url) -> String {
    let host = base_url.host_str().unwrap_or_default();
    match base_url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => tracing::error!("Skipping invalid value for header {name}: {e}"),
    }
}

/// Apply model mapping and reasoning injection to a JSON object body.
///
/// Returns `None` when the body is left as-is: it did not decode as a JSON
/// object, or nothing needed to change.
fn rewrite_json_body(body: &[u8], mapper: &ModelMapper, enable_reasoning: bool) -> Option<Bytes> {
    let mut fields: Map<String, Value> = match serde_json::from_slice(body) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::error!("Failed to decode request body, forwarding unchanged: {e}");
            return None;
        }
    };

    let mut changed = false;

    let mapped = match fields.get(MODEL_FIELD).and_then(Value::as_str) {
        Some(source) => {
            let resolution = mapper.resolve(source);
            if !resolution.is_mapped() {
                tracing::warn!("model {source} not found in model mappings");
            }
            resolution
                .is_mapped()
                .then(|| resolution.model().to_string())
        }
        None => None,
    };
    if let Some(target) = mapped {
        fields.insert(MODEL_FIELD.to_string(), Value::String(target));
        changed = true;
    }

    if enable_reasoning {
        fields.insert(INCLUDE_REASONING_FIELD.to_string(), Value::Bool(true));
        changed = true;
    }

    if !changed {
        return None;
    }

    match serde_json::to_vec(&fields) {
        Ok(encoded) => Some(Bytes::from(encoded)),
        Err(e) => {
            tracing::error!("Failed to encode rewritten request body: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use std::collections::HashMap;

    fn config() -> ProxyConfig {
        ProxyConfig {
            base_url: Url::parse("https://openrouter.ai/api/v1").unwrap(),
            api_key: Some("sk-or-test".to_string()),
            model_mappings: HashMap::new(),
            enable_reasoning: false,
            rankings_title: None,
            rankings_url: None,
            debug: false,
        }
    }

    fn mapper() -> ModelMapper {
        ModelMapper::new(HashMap::from([(
            "deepseek-reasoner".to_string(),
            "provider/deepseek-r1".to_string(),
        )]))
    }

    fn json_request(body: &str) -> OutboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        OutboundRequest {
            method: Method::POST,
            uri: Uri::from_static("/chat/completions?trace=1"),
            headers,
            body: OutboundBody::Buffered(Bytes::from(body.to_string())),
        }
    }

    fn body_json(request: &OutboundRequest) -> Value {
        match &request.body {
            OutboundBody::Buffered(bytes) => serde_json::from_slice(bytes).unwrap(),
            OutboundBody::Passthrough(_) => panic!("expected buffered body"),
        }
    }

    fn declared_length_matches(request: &OutboundRequest) -> bool {
        let OutboundBody::Buffered(bytes) = &request.body else {
            return false;
        };
        request.headers[header::CONTENT_LENGTH] == bytes.len().to_string()
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/api/v1", "/chat/completions"), "/api/v1/chat/completions");
        assert_eq!(join_paths("/", "/chat/completions"), "/chat/completions");
        assert_eq!(join_paths("/api/v1/", "//chat//completions/"), "/api/v1/chat/completions");
        assert_eq!(join_paths("/api", "/../../models"), "/api/models");
        assert_eq!(join_paths("", ""), "/");
    }

    #[test]
    fn test_join_paths_encoded_dot_segments() {
        assert_eq!(join_paths("/api/v1", "/%2e%2e/%2E%2E/internal"), "/api/v1/internal");
        assert_eq!(join_paths("/api/v1", "/chat/.%2e/%2e./models"), "/api/v1/models");
        assert_eq!(join_paths("/api/v1", "/%2e/chat/%2E"), "/api/v1/chat");
        assert_eq!(join_paths("/api/v1", "/%2e%2efoo"), "/api/v1/%2e%2efoo");
    }

    #[test]
    fn test_retarget_keeps_base_path_for_encoded_traversal() {
        let mut request = json_request("{}");
        request.uri = Uri::from_static("/%2e%2e/%2E%2E/internal");

        rewrite_request(&mut request, &config(), &mapper());

        assert_eq!(request.uri.to_string(), "https://openrouter.ai/api/v1/internal");
        assert!(request.uri.path().starts_with("/api/v1/"));
    }

    #[test]
    fn test_stays_under() {
        assert!(stays_under("/api/v1/chat", "/api/v1"));
        assert!(stays_under("/api/v1", "/api/v1/"));
        assert!(!stays_under("/internal", "/api/v1"));
        assert!(!stays_under("/api/v10", "/api/v1"));
        assert!(stays_under("/anything", "/"));
    }

    #[test]
    fn test_retarget_and_headers() {
        let mut config = config();
        config.rankings_title = Some("Relay".to_string());
        let mut request = json_request(r#"{"model":"x"}"#);
        request
            .headers
            .insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        request
            .headers
            .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        rewrite_request(&mut request, &config, &mapper());

        assert_eq!(
            request.uri.to_string(),
            "https://openrouter.ai/api/v1/chat/completions?trace=1"
        );
        assert_eq!(request.headers[header::HOST], "openrouter.ai");
        assert_eq!(request.headers[RANKINGS_TITLE_HEADER], "Relay");
        assert!(!request.headers.contains_key(RANKINGS_URL_HEADER));
        assert_eq!(request.headers[header::AUTHORIZATION], "Bearer sk-or-test");
        assert!(!request.headers.contains_key(header::ACCEPT_ENCODING));
        assert!(!request.headers.contains_key(header::CONNECTION));
    }

    #[test]
    fn test_host_header_keeps_explicit_port() {
        let mut config = config();
        config.base_url = Url::parse("http://127.0.0.1:8081/v1").unwrap();
        let mut request = json_request("{}");

        rewrite_request(&mut request, &config, &mapper());

        assert_eq!(request.headers[header::HOST], "127.0.0.1:8081");
        assert_eq!(request.uri.to_string(), "http://127.0.0.1:8081/v1/chat/completions?trace=1");
    }

    #[test]
    fn test_no_api_key_keeps_client_authorization() {
        let mut config = config();
        config.api_key = None;
        let mut request = json_request("{}");
        request
            .headers
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer client"));

        rewrite_request(&mut request, &config, &mapper());

        assert_eq!(request.headers[header::AUTHORIZATION], "Bearer client");
    }

    #[test]
    fn test_model_is_mapped() {
        let mut request = json_request(r#"{"model":"deepseek-reasoner","stream":false,"messages":[]}"#);

        rewrite_request(&mut request, &config(), &mapper());

        let body = body_json(&request);
        assert_eq!(body["model"], "provider/deepseek-r1");
        assert_eq!(body["stream"], false);
        assert!(body.get("include_reasoning").is_none());
        assert!(declared_length_matches(&request));
    }

    #[test]
    fn test_unmapped_model_passes_through() {
        let mut request = json_request(r#"{"model":"deepseek-chat","messages":[]}"#);

        rewrite_request(&mut request, &config(), &mapper());

        assert_eq!(body_json(&request)["model"], "deepseek-chat");
        assert!(declared_length_matches(&request));
    }

    #[test]
    fn test_include_reasoning_injected() {
        let mut config = config();
        config.enable_reasoning = true;
        let mut request = json_request(r#"{"model":"deepseek-chat"}"#);

        rewrite_request(&mut request, &config, &mapper());

        let body = body_json(&request);
        assert_eq!(body["include_reasoning"], true);
        assert_eq!(body["model"], "deepseek-chat");
        assert!(declared_length_matches(&request));
    }

    #[test]
    fn test_malformed_body_left_untouched() {
        let raw = r#"{"model":"deepseek-reasoner","#;
        let mut config = config();
        config.enable_reasoning = true;
        let mut request = json_request(raw);

        rewrite_request(&mut request, &config, &mapper());

        let OutboundBody::Buffered(bytes) = &request.body else {
            panic!("expected buffered body");
        };
        assert_eq!(bytes, raw.as_bytes());
        assert!(declared_length_matches(&request));
    }

    #[test]
    fn test_non_json_body_not_rewritten() {
        let mut request = json_request(r#"{"model":"deepseek-reasoner"}"#);
        request
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        rewrite_request(&mut request, &config(), &mapper());

        let OutboundBody::Buffered(bytes) = &request.body else {
            panic!("expected buffered body");
        };
        assert_eq!(bytes, r#"{"model":"deepseek-reasoner"}"#.as_bytes());
    }
}
