//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! GET /session (no cookie):
//!     → store.rs creates Session { id, csrf token }
//!     → cookie.rs renders Set-Cookie
//!
//! Any later request:
//!     Cookie header
//!     → cookie.rs extracts session id
//!     → store.rs lookup
//!     → Arc<Session> attached to request extensions
//! ```
//!
//! # Design Decisions
//! - Sessions live in memory only; a restart drops them
//! - Session ids and CSRF tokens are independent UUID v4 values
//! - Unknown and idle-expired session ids are treated as "no session"
//! - Idle sessions are dropped lazily on lookup and by a periodic sweep

pub mod cookie;
pub mod store;

pub use cookie::{session_cookie, session_id_from_headers};
pub use store::{Session, SessionStore, CSRF_SESSION_ATTRIBUTE};
