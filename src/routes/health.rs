use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde_json::{Value, json};

use crate::error::ProxyError;
use crate::{BUILD_TIME, GIT_HASH, VERSION};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn version() -> Json<Value> {
    Json(json!({
        "version": VERSION,
        "git_hash": GIT_HASH,
        "build_time": BUILD_TIME,
    }))
}

/// `/` points at the API docs shipped in the web root
pub async fn root_redirect() -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/swagger/")]).into_response()
}

pub async fn not_found() -> Response {
    ProxyError::NotFound.into_response()
}
