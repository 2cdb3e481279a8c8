//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::security::annotations::AnnotationSet;
use crate::security::checker::{AccessCheckerConfig, DeploymentMode};

/// Root configuration for the endpoint guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Access checking and session settings.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Known users, authenticated by bearer token.
    pub users: Vec<UserConfig>,

    /// Endpoints and their access markers.
    pub endpoints: Vec<EndpointConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Access checking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Check the `X-CSRF-Token` header against the session token.
    pub csrf_enabled: bool,

    /// `production` hides configuration hints in denial messages.
    pub deployment_mode: DeploymentMode,

    /// Name of the session cookie.
    pub session_cookie: String,

    /// Seconds a session may stay unused before it is dropped.
    pub session_idle_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            csrf_enabled: true,
            deployment_mode: DeploymentMode::Production,
            session_cookie: "GUARDSESSION".to_string(),
            session_idle_secs: 1800,
        }
    }
}

impl SecurityConfig {
    pub fn checker_config(&self) -> AccessCheckerConfig {
        AccessCheckerConfig {
            csrf_enabled: self.csrf_enabled,
            mode: self.deployment_mode,
        }
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A user known to the guard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    /// Principal name.
    pub name: String,

    /// Bearer token presented in the `Authorization` header.
    pub token: String,

    /// Roles held by the user.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// An endpoint and the markers declared on it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Endpoint name, the first path segment after `/connect/`.
    pub name: String,

    /// Endpoint-level markers.
    #[serde(flatten)]
    pub annotations: AnnotationSet,

    /// Methods of the endpoint.
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
}

/// A method and the markers declared on it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MethodConfig {
    /// Method name, the second path segment after `/connect/`.
    pub name: String,

    /// Non-public methods are never dispatched.
    #[serde(default = "default_public")]
    pub public: bool,

    /// Method-level markers. Any marker here replaces all endpoint markers.
    #[serde(flatten)]
    pub annotations: AnnotationSet,
}

fn default_public() -> bool {
    true
}
