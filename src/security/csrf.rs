//! CSRF token validation.
//!
//! # Responsibilities
//! - Compare the token stored in the session with the `X-CSRF-Token` header
//! - Report why a request failed, for logs and metrics
//!
//! # Design Decisions
//! - Comparison is constant-time over the token bytes (`subtle`)
//! - No session means no token was ever issued: the request passes
//! - A session without a stored token is inconsistent: the request fails

use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::observability::metrics;
use crate::security::context::RequestContext;
use crate::session::CSRF_SESSION_ATTRIBUTE;

/// Request header carrying the CSRF token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Result of a CSRF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CsrfOutcome {
    /// Header token matches the session token.
    Valid,
    /// Protection is turned off.
    Disabled,
    /// The request has no session.
    NoSession,
    /// A session exists but holds no token.
    MissingSessionToken,
    /// Header token is absent or does not match.
    InvalidToken,
}

impl CsrfOutcome {
    pub fn is_valid(self) -> bool {
        matches!(
            self,
            CsrfOutcome::Valid | CsrfOutcome::Disabled | CsrfOutcome::NoSession
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CsrfOutcome::Valid => "valid",
            CsrfOutcome::Disabled => "disabled",
            CsrfOutcome::NoSession => "no_session",
            CsrfOutcome::MissingSessionToken => "missing_session_token",
            CsrfOutcome::InvalidToken => "invalid_token",
        }
    }
}

/// Validates the CSRF token of a request against its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrfValidator {
    enabled: bool,
}

impl CsrfValidator {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// True if the token is valid, protection is disabled, or there is no
    /// session.
    pub fn validate(&self, ctx: &dyn RequestContext) -> bool {
        self.check(ctx).is_valid()
    }

    pub fn check(&self, ctx: &dyn RequestContext) -> CsrfOutcome {
        if !self.enabled {
            return CsrfOutcome::Disabled;
        }

        let Some(session) = ctx.session() else {
            return CsrfOutcome::NoSession;
        };

        let Some(expected) = session.attribute(CSRF_SESSION_ATTRIBUTE) else {
            tracing::info!(
                "Unable to verify CSRF token for endpoint request, got null token in session"
            );
            metrics::record_csrf_failure(CsrfOutcome::MissingSessionToken.as_str());
            return CsrfOutcome::MissingSessionToken;
        };

        let matches = ctx
            .header(CSRF_HEADER)
            .map(|submitted| tokens_match(&expected, submitted))
            .unwrap_or(false);

        if matches {
            CsrfOutcome::Valid
        } else {
            tracing::info!("Invalid CSRF token in endpoint request");
            metrics::record_csrf_failure(CsrfOutcome::InvalidToken.as_str());
            CsrfOutcome::InvalidToken
        }
    }
}

impl Default for CsrfValidator {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Constant-time comparison of two UTF-8 tokens.
///
/// Runs in time that depends only on the length of `expected`: every byte of
/// `expected` is compared, against a zero byte once `submitted` runs out,
/// and the length check is folded in without an early return.
pub fn tokens_match(expected: &str, submitted: &str) -> bool {
    let expected = expected.as_bytes();
    let submitted = submitted.as_bytes();

    let mut equal = (expected.len() as u64).ct_eq(&(submitted.len() as u64));
    for (i, byte) in expected.iter().enumerate() {
        let other = if i < submitted.len() { submitted[i] } else { 0 };
        equal &= byte.ct_eq(&other);
    }
    equal.into()
}
