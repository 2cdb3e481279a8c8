//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Detect duplicate endpoint, method, and user definitions
//! - Validate addresses and role lists
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::security::annotations::AnnotationSet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("session cookie name must not be empty")]
    EmptyCookieName,

    #[error("session idle timeout must be greater than zero")]
    ZeroSessionIdle,

    #[error("endpoint name must not be empty")]
    EmptyEndpointName,

    #[error("endpoint '{0}' is defined more than once")]
    DuplicateEndpoint(String),

    #[error("method name in endpoint '{0}' must not be empty")]
    EmptyMethodName(String),

    #[error("method '{endpoint}.{method}' is defined more than once")]
    DuplicateMethod { endpoint: String, method: String },

    #[error("roles_allowed on '{0}' lists no roles")]
    EmptyRoles(String),

    #[error("user '{0}' has an empty token")]
    EmptyToken(String),

    #[error("users '{0}' and '{1}' share a token")]
    DuplicateToken(String, String),
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.security.session_cookie.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }
    if config.security.session_idle_secs == 0 {
        errors.push(ValidationError::ZeroSessionIdle);
    }

    let mut endpoint_names = HashSet::new();
    for endpoint in &config.endpoints {
        if endpoint.name.is_empty() {
            errors.push(ValidationError::EmptyEndpointName);
            continue;
        }
        if !endpoint_names.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.name.clone()));
        }
        check_roles(&endpoint.annotations, &endpoint.name, &mut errors);

        let mut method_names = HashSet::new();
        for method in &endpoint.methods {
            if method.name.is_empty() {
                errors.push(ValidationError::EmptyMethodName(endpoint.name.clone()));
                continue;
            }
            if !method_names.insert(method.name.as_str()) {
                errors.push(ValidationError::DuplicateMethod {
                    endpoint: endpoint.name.clone(),
                    method: method.name.clone(),
                });
            }
            let qualified = format!("{}.{}", endpoint.name, method.name);
            check_roles(&method.annotations, &qualified, &mut errors);
        }
    }

    let mut tokens: Vec<(&str, &str)> = Vec::new();
    for user in &config.users {
        if user.token.is_empty() {
            errors.push(ValidationError::EmptyToken(user.name.clone()));
            continue;
        }
        if let Some((other, _)) = tokens.iter().find(|(_, token)| *token == user.token) {
            errors.push(ValidationError::DuplicateToken(
                (*other).to_string(),
                user.name.clone(),
            ));
        }
        tokens.push((user.name.as_str(), user.token.as_str()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_roles(annotations: &AnnotationSet, target: &str, errors: &mut Vec<ValidationError>) {
    if annotations
        .roles_allowed()
        .map(|roles| roles.is_empty())
        .unwrap_or(false)
    {
        errors.push(ValidationError::EmptyRoles(target.to_string()));
    }
}
