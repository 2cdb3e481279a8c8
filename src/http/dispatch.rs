//! Endpoint dispatch handlers.
//!
//! # Responsibilities
//! - Resolve `/connect/{endpoint}/{method}` to a registered public method
//! - Run the access checker and turn denials into 401/403 responses
//! - Invoke the method handler with the JSON request body
//! - Issue and drop sessions (`/session`)

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::http::request::request_id;
use crate::http::response::{endpoint_error_response, error_response};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::checker::Verdict;
use crate::security::context::HttpRequestContext;
use crate::session::{session_cookie, Session};

/// Maximum accepted request body, in bytes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// `POST /connect/{endpoint}/{method}`
pub async fn connect_handler(
    State(state): State<AppState>,
    Path((endpoint_name, method_name)): Path<(String, String)>,
    request: Request<Body>,
) -> Response {
    let request_id = request_id(request.headers()).to_string();

    let Some(target) = state.registry.lookup(&endpoint_name, &method_name) else {
        tracing::warn!(
            request_id = %request_id,
            endpoint = %endpoint_name,
            method = %method_name,
            "No such endpoint method"
        );
        metrics::record_request(StatusCode::NOT_FOUND.as_u16());
        return endpoint_error_response(
            StatusCode::NOT_FOUND,
            "Endpoint method not found",
            &endpoint_name,
            &method_name,
        );
    };

    let (verdict, caller) = {
        let ctx = HttpRequestContext::from_request(&request);
        let caller = ctx.principal().map(|p| p.name.clone());
        match state.checker.check(target, &ctx) {
            Ok(verdict) => (verdict, caller),
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Access check failed");
                metrics::record_request(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
                return endpoint_error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Access check failed",
                    &endpoint_name,
                    &method_name,
                );
            }
        }
    };

    if let Verdict::Denied(reason) = verdict {
        let status = if caller.is_some() {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        };
        tracing::info!(
            request_id = %request_id,
            method = %target.qualified_name(),
            principal = caller.as_deref().unwrap_or("anonymous"),
            reason = reason.as_str(),
            "Endpoint access denied"
        );
        metrics::record_access_decision(reason.as_str());
        metrics::record_request(status.as_u16());
        return endpoint_error_response(status, reason.to_string(), &endpoint_name, &method_name);
    }
    metrics::record_access_decision("allowed");

    let body = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_request(StatusCode::PAYLOAD_TOO_LARGE.as_u16());
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
    };

    let params = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "Malformed JSON body");
                metrics::record_request(StatusCode::BAD_REQUEST.as_u16());
                return endpoint_error_response(
                    StatusCode::BAD_REQUEST,
                    "Request body is not valid JSON",
                    &endpoint_name,
                    &method_name,
                );
            }
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %target.qualified_name(),
        "Invoking endpoint method"
    );
    let result = target.method.invoke(params);
    metrics::record_request(StatusCode::OK.as_u16());
    Json(result).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub csrf_token: Option<String>,
}

/// `GET /session`: the caller's CSRF token, opening a session if needed.
pub async fn session_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    if let Some(session) = request.extensions().get::<Arc<Session>>() {
        metrics::record_request(StatusCode::OK.as_u16());
        return Json(SessionInfo {
            csrf_token: session.csrf_token(),
        })
        .into_response();
    }

    let session = state.sessions.create();
    let cookie = session_cookie(&state.session_cookie, session.id());
    let cookie = match HeaderValue::from_str(&cookie) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Session cookie is not a valid header value");
            state.sessions.invalidate(session.id());
            metrics::record_request(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Unable to open session");
        }
    };

    tracing::info!(
        request_id = %request_id(request.headers()),
        session_id = %session.id(),
        "Issued session cookie"
    );
    metrics::record_request(StatusCode::OK.as_u16());
    let mut response = Json(SessionInfo {
        csrf_token: session.csrf_token(),
    })
    .into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    response
}

/// `DELETE /session`: drop the caller's session.
pub async fn end_session_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    match request.extensions().get::<Arc<Session>>() {
        Some(session) => {
            state.sessions.invalidate(session.id());
            metrics::record_request(StatusCode::NO_CONTENT.as_u16());
            StatusCode::NO_CONTENT.into_response()
        }
        None => {
            metrics::record_request(StatusCode::NOT_FOUND.as_u16());
            error_response(StatusCode::NOT_FOUND, "No active session")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use ::metrics::{
        Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString,
        Unit,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::GuardConfig;
    use crate::endpoint::EndpointRegistry;
    use crate::http::GuardServer;

    /// Counts `guard_requests_total` increments per `status` label.
    #[derive(Default)]
    struct StatusRecorder {
        counts: Arc<Mutex<HashMap<String, u64>>>,
    }

    struct StatusCounter {
        status: String,
        counts: Arc<Mutex<HashMap<String, u64>>>,
    }

    impl CounterFn for StatusCounter {
        fn increment(&self, value: u64) {
            *self
                .counts
                .lock()
                .unwrap()
                .entry(self.status.clone())
                .or_default() += value;
        }

        fn absolute(&self, value: u64) {
            self.counts
                .lock()
                .unwrap()
                .insert(self.status.clone(), value);
        }
    }

    impl Recorder for StatusRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            if key.name() != "guard_requests_total" {
                return Counter::noop();
            }
            let status = key
                .labels()
                .find(|label| label.key() == "status")
                .map(|label| label.value().to_string())
                .unwrap_or_default();
            Counter::from_arc(Arc::new(StatusCounter {
                status,
                counts: self.counts.clone(),
            }))
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    fn session_request(method: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("/session");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_session_routes_count_requests() {
        let recorder = StatusRecorder::default();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        let router = GuardServer::new(GuardConfig::default(), EndpointRegistry::new()).router();

        let opened = router
            .clone()
            .oneshot(session_request("GET", None))
            .await
            .unwrap();
        assert_eq!(opened.status(), StatusCode::OK);
        let cookie = opened
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string();

        for (method, expected) in [
            ("GET", StatusCode::OK),
            ("DELETE", StatusCode::NO_CONTENT),
            ("DELETE", StatusCode::NOT_FOUND),
        ] {
            let res = router
                .clone()
                .oneshot(session_request(method, Some(&cookie)))
                .await
                .unwrap();
            assert_eq!(res.status(), expected, "{method}");
        }

        let counts = recorder.counts.lock().unwrap().clone();
        assert_eq!(counts.get("200"), Some(&2));
        assert_eq!(counts.get("204"), Some(&1));
        assert_eq!(counts.get("404"), Some(&1));
    }
}
