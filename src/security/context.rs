//! Read-only view of the request being checked.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use serde::Serialize;

use crate::session::Session;

/// Attribute lookup on a server-side session.
pub trait SessionAttributes {
    fn attribute(&self, name: &str) -> Option<String>;
}

/// What the access checker needs to know about a request.
pub trait RequestContext {
    /// True if the request carries an authenticated principal.
    fn is_authenticated(&self) -> bool;

    /// Role membership of the authenticated principal. Always false for
    /// anonymous requests.
    fn is_user_in_role(&self, role: &str) -> bool;

    /// The active session, if one exists. Never creates a session.
    fn session(&self) -> Option<&dyn SessionAttributes>;

    /// Header lookup (case-insensitive name).
    fn header(&self, name: &str) -> Option<&str>;
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub name: String,
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// [`RequestContext`] over an HTTP request.
///
/// The principal and session are read from request extensions, where the
/// authentication and session middleware put them.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequestContext<'a> {
    headers: &'a HeaderMap,
    principal: Option<&'a Principal>,
    session: Option<&'a Session>,
}

impl<'a> HttpRequestContext<'a> {
    pub fn new(
        headers: &'a HeaderMap,
        principal: Option<&'a Principal>,
        session: Option<&'a Session>,
    ) -> Self {
        Self {
            headers,
            principal,
            session,
        }
    }

    pub fn from_request(request: &'a Request<Body>) -> Self {
        let extensions = request.extensions();
        Self {
            headers: request.headers(),
            principal: extensions.get::<Principal>(),
            session: extensions.get::<Arc<Session>>().map(|session| session.as_ref()),
        }
    }

    pub fn principal(&self) -> Option<&'a Principal> {
        self.principal
    }
}

impl RequestContext for HttpRequestContext<'_> {
    fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    fn is_user_in_role(&self, role: &str) -> bool {
        self.principal
            .map(|principal| principal.has_role(role))
            .unwrap_or(false)
    }

    fn session(&self) -> Option<&dyn SessionAttributes> {
        self.session.map(|session| session as &dyn SessionAttributes)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CSRF_SESSION_ATTRIBUTE;

    #[test]
    fn test_anonymous_request() {
        let request = Request::builder()
            .header("x-csrf-token", "abc")
            .body(Body::empty())
            .unwrap();
        let ctx = HttpRequestContext::from_request(&request);

        assert!(!ctx.is_authenticated());
        assert!(!ctx.is_user_in_role("ROLE_USER"));
        assert!(ctx.session().is_none());
        assert_eq!(ctx.header("X-CSRF-Token"), Some("abc"));
    }

    #[test]
    fn test_principal_and_session_from_extensions() {
        let session = Arc::new(Session::new("s1"));
        session.set_attribute(CSRF_SESSION_ATTRIBUTE, "T1");

        let mut request = Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(Principal::new("alice", ["ROLE_USER"]));
        request.extensions_mut().insert(session);

        let ctx = HttpRequestContext::from_request(&request);
        assert!(ctx.is_authenticated());
        assert!(ctx.is_user_in_role("ROLE_USER"));
        assert!(!ctx.is_user_in_role("ROLE_ADMIN"));
        assert_eq!(
            ctx.session().unwrap().attribute(CSRF_SESSION_ATTRIBUTE).as_deref(),
            Some("T1")
        );
    }
}
