use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid api key")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("streaming unsupported")]
    StreamingUnsupported,

    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("not found")]
    NotFound,
}

/// Error detail inside the envelope
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub message: String,
}

/// Structured error envelope returned to clients
#[derive(Debug, Serialize)]
pub struct ApiErrorEnvelope {
    #[serde(rename = "type")]
    pub envelope_type: &'static str,
    pub error: ApiError,
}

impl ProxyError {
    /// Status code and error discriminator for this error.
    ///
    /// Validation failures raised by the gateway itself are reported with
    /// status 200, which is what existing clients of this gateway expect.
    pub fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ProxyError::MissingApiKey
            | ProxyError::InvalidApiKey
            | ProxyError::StreamingUnsupported
            | ProxyError::RequestBody(_) => (StatusCode::OK, "invalid_request_error"),
            ProxyError::Upstream(_) => (StatusCode::BAD_GATEWAY, "api_error"),
            ProxyError::NotFound => (StatusCode::NOT_FOUND, "error"),
        }
    }

    pub fn envelope(&self) -> ApiErrorEnvelope {
        let (_, error_type) = self.status_and_type();
        ApiErrorEnvelope {
            envelope_type: "error",
            error: ApiError {
                error_type,
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_type();
        (status, Json(self.envelope())).into_response()
    }
}
