//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch of /connect/{endpoint}/{method}:
//!     → context.rs (principal, session, headers of the request)
//!     → checker.rs
//!         → target.rs (method markers, else endpoint markers)
//!         → csrf.rs (session token vs X-CSRF-Token)
//!         → marker precedence
//!     → Verdict (Allowed | Denied(reason))
//! ```
//!
//! # Design Decisions
//! - Fail closed: a target without markers is denied
//! - Denial is a value, not an error; only misuse (non-public target) errors
//! - Checker configuration is fixed at construction

pub mod annotations;
pub mod checker;
pub mod context;
pub mod csrf;
pub mod error;
pub mod target;

pub use annotations::{AccessAnnotation, AnnotationKind, AnnotationSet};
pub use checker::{
    annotation_allows_access, AccessChecker, AccessCheckerConfig, DenialReason, DeploymentMode,
    Verdict,
};
pub use context::{HttpRequestContext, Principal, RequestContext, SessionAttributes};
pub use csrf::{CsrfOutcome, CsrfValidator, CSRF_HEADER};
pub use error::AccessError;
pub use target::{security_target, SecurityTarget, TargetLevel};
