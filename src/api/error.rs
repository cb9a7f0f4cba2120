//! Maps [`crate::error::Error`] onto the `{code:-1, message, data?}`
//! envelope and an HTTP status (§6, §7), mirroring the exception handlers
//! in `examples/original_source/netpulse/server/common.py`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Carries whatever HTTP status an error should surface as, independent
/// of the domain [`crate::error::Error`] it may have been built from.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    data: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Invalid or missing API key.")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<crate::error::Error> for ApiError {
    fn from(e: crate::error::Error) -> Self {
        use crate::error::Error as E;
        let status = match &e {
            E::Validation(_) => StatusCode::BAD_REQUEST,
            E::Authentication => StatusCode::FORBIDDEN,
            E::WorkerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            E::NodePreempted(_) | E::HostAlreadyPinned(_) => StatusCode::INTERNAL_SERVER_ERROR,
            E::JobOperation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            E::Driver(_) => StatusCode::BAD_GATEWAY,
            E::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            E::Webhook(_) => StatusCode::BAD_GATEWAY,
            E::Store(_) | E::StorePipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            E::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            E::Serialization(_) | E::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            code: -1,
            message: self.message,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}
