//! Shared utilities for integration tests.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use endpoint_guard::config::{parse_config, GuardConfig};
use endpoint_guard::endpoint::{echo_handler, EndpointRegistry};
use endpoint_guard::http::GuardServer;

pub const DEMO_CONFIG: &str = r#"
[[users]]
name = "alice"
token = "alice-token"
roles = ["ROLE_USER"]

[[users]]
name = "bob"
token = "bob-token"

[[endpoints]]
name = "DemoEndpoint"
deny_all = true

[[endpoints.methods]]
name = "method1"

[[endpoints.methods]]
name = "method2"
permit_all = true

[[endpoints.methods]]
name = "method3"
roles_allowed = ["ROLE_USER"]

[[endpoints.methods]]
name = "method4"
anonymous_allowed = true

[[endpoints.methods]]
name = "helper"
public = false
anonymous_allowed = true

[[endpoints]]
name = "PlainEndpoint"

[[endpoints.methods]]
name = "call"
"#;

/// Parse the demo config, then let the caller tweak it.
pub fn demo_config(tweak: impl FnOnce(&mut GuardConfig)) -> GuardConfig {
    let mut config = parse_config(DEMO_CONFIG).expect("demo config is valid");
    tweak(&mut config);
    config
}

/// Build a server over the demo config with echo handlers.
pub fn demo_server(tweak: impl FnOnce(&mut GuardConfig)) -> GuardServer {
    let config = demo_config(tweak);
    let registry = EndpointRegistry::from_config(&config.endpoints, echo_handler());
    GuardServer::new(config, registry)
}

/// Response status, headers, and body parsed as JSON (Null if empty).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Builder for `POST /connect/{endpoint}/{method}`.
pub struct Call {
    builder: axum::http::request::Builder,
    body: String,
}

impl Call {
    pub fn new(endpoint: &str, method: &str) -> Self {
        Self {
            builder: Request::builder()
                .method("POST")
                .uri(format!("/connect/{endpoint}/{method}"))
                .header(header::CONTENT_TYPE, "application/json"),
            body: String::new(),
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.builder = self
            .builder
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        self
    }

    pub fn cookie(mut self, cookie: &str) -> Self {
        self.builder = self.builder.header(header::COOKIE, cookie);
        self
    }

    pub fn csrf(mut self, token: &str) -> Self {
        self.builder = self.builder.header("X-CSRF-Token", token);
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn build(self) -> Request<Body> {
        self.builder.body(Body::from(self.body)).unwrap()
    }
}

/// Open a session. Returns the `Cookie` header value and the CSRF token.
pub async fn open_session(router: &Router) -> (String, String) {
    let request = Request::builder()
        .uri("/session")
        .body(Body::empty())
        .unwrap();
    let response = send(router, request).await;
    assert_eq!(response.status, StatusCode::OK);

    let set_cookie = response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie is set");
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let token = response.body["csrfToken"].as_str().unwrap().to_string();
    (cookie, token)
}
