//! Request middleware.
//!
//! Runs before dispatch and attaches what the access checker reads:
//! - authentication.rs: `Principal` from a bearer token
//! - session.rs: `Arc<Session>` from the session cookie

pub mod authentication;
pub mod session;

pub use authentication::{authentication_middleware, bearer_token, UserDirectory};
pub use session::session_middleware;
