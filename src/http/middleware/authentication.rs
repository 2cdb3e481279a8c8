//! Bearer token authentication.
//!
//! Unknown or malformed tokens are not rejected here: the request simply
//! continues without a principal and is checked as anonymous.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::config::UserConfig;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::security::context::Principal;
use crate::security::csrf::tokens_match;

/// Token → principal lookup built from config.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<(String, Principal)>,
}

impl UserDirectory {
    pub fn from_config(users: &[UserConfig]) -> Self {
        Self {
            users: users
                .iter()
                .map(|user| {
                    (
                        user.token.clone(),
                        Principal::new(user.name.clone(), user.roles.iter().cloned()),
                    )
                })
                .collect(),
        }
    }

    /// Find the principal owning `token`. Every entry is compared so the
    /// lookup time does not depend on which entry matches.
    pub fn authenticate(&self, token: &str) -> Option<&Principal> {
        let mut found = None;
        for (candidate, principal) in &self.users {
            if tokens_match(candidate, token) && found.is_none() {
                found = Some(principal);
            }
        }
        found
    }
}

/// Token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn authentication_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let lookup = bearer_token(request.headers())
        .map(|token| state.users.authenticate(token).cloned());

    match lookup {
        Some(Some(principal)) => {
            tracing::debug!(
                request_id = %request_id(request.headers()),
                principal = %principal.name,
                "Request authenticated"
            );
            request.extensions_mut().insert(principal);
        }
        Some(None) => {
            tracing::debug!(
                request_id = %request_id(request.headers()),
                "Unknown bearer token, continuing as anonymous"
            );
        }
        None => {}
    }

    next.run(request).await
}
