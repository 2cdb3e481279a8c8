//! Error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON body returned for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        message: message.into(),
        endpoint: None,
        method: None,
    };
    (status, Json(body)).into_response()
}

/// Error response naming the endpoint method that was called.
pub fn endpoint_error_response(
    status: StatusCode,
    message: impl Into<String>,
    endpoint: &str,
    method: &str,
) -> Response {
    let body = ErrorBody {
        message: message.into(),
        endpoint: Some(endpoint.to_string()),
        method: Some(method.to_string()),
    };
    (status, Json(body)).into_response()
}
