//! Endpoint access guard library.
//!
//! Decides whether a request may call a server-side endpoint method, from
//! access markers declared on the method or its endpoint, the caller's
//! roles, and a CSRF token bound to the session.

pub mod config;
pub mod endpoint;
pub mod http;
pub mod observability;
pub mod security;
pub mod session;

pub use config::GuardConfig;
pub use endpoint::EndpointRegistry;
pub use http::GuardServer;
pub use security::{AccessChecker, Verdict};
