//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID)
//!     → middleware/ (principal from bearer token, session from cookie)
//!     → dispatch.rs (registry lookup → access check → handler)
//!     → response.rs (JSON error bodies)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, X_REQUEST_ID};
pub use server::{AppState, GuardServer};
