//! Endpoint access checker.
//!
//! Decides whether a request may call an endpoint method, based on the
//! access markers of the method (or of its endpoint) and the CSRF token.
//!
//! ```text
//! check(method, request)
//!     authenticated? ── yes ──▶ csrf ok && markers allow ──▶ Allowed
//!          │                          │
//!          │                          └─ else ──▶ Denied(Unauthorized | hint)
//!          no
//!          ▼
//!     target has AnonymousAllowed && csrf ok && markers allow ──▶ Allowed
//!          └─ else ──▶ Denied(AnonymousNotAllowed)
//! ```
//!
//! Marker precedence on the resolved target:
//! `DenyAll` > `AnonymousAllowed` > `RolesAllowed` > `PermitAll` > deny.
//!
//! For example, with
//!
//! ```text
//! DemoEndpoint            deny_all
//!     method1             (none)
//!     method2             permit_all
//!     method3             roles_allowed = ["ROLE_USER"]
//!     method4             anonymous_allowed
//! ```
//!
//! `method1` is callable by nobody, `method2` by any authenticated caller,
//! `method3` only by callers holding `ROLE_USER`, and `method4` by everyone,
//! including anonymous callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::endpoint::MethodRef;
use crate::security::annotations::{AnnotationKind, AnnotationSet};
use crate::security::context::RequestContext;
use crate::security::csrf::CsrfValidator;
use crate::security::error::AccessError;
use crate::security::target::{security_target, SecurityTarget};

/// Deployment mode of the hosting server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    Development,
    #[default]
    Production,
}

/// Immutable checker configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessCheckerConfig {
    pub csrf_enabled: bool,
    pub mode: DeploymentMode,
}

impl Default for AccessCheckerConfig {
    fn default() -> Self {
        Self {
            csrf_enabled: true,
            mode: DeploymentMode::Production,
        }
    }
}

/// Why a call was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Anonymous caller on a target that does not allow anonymous access.
    AnonymousNotAllowed,
    /// Authenticated caller, production mode.
    ///
    /// Renders as `"Unauthorized access to endpoint"`. The wording is stable;
    /// clients and log filters may match on it.
    Unauthorized,
    /// Authenticated caller, development mode: message lists the markers
    /// that would grant access.
    UnauthorizedWithHint,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenialReason::AnonymousNotAllowed => "anonymous_not_allowed",
            DenialReason::Unauthorized => "unauthorized",
            DenialReason::UnauthorizedWithHint => "unauthorized_with_hint",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::AnonymousNotAllowed => f.write_str("Anonymous access is not allowed"),
            DenialReason::Unauthorized => f.write_str("Unauthorized access to endpoint"),
            DenialReason::UnauthorizedWithHint => {
                f.write_str(
                    "Unauthorized access to endpoint; to enable endpoint access use one of the following annotations: ",
                )?;
                for (i, kind) in AnnotationKind::GRANTING.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{kind}")?;
                }
                Ok(())
            }
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied(DenialReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    /// `None` if allowed, the denial message otherwise.
    pub fn denial_message(&self) -> Option<String> {
        match self {
            Verdict::Allowed => None,
            Verdict::Denied(reason) => Some(reason.to_string()),
        }
    }
}

/// Role-based access checker for endpoint methods.
#[derive(Debug, Clone)]
pub struct AccessChecker {
    mode: DeploymentMode,
    csrf: CsrfValidator,
}

impl AccessChecker {
    pub fn new(config: AccessCheckerConfig) -> Self {
        Self {
            mode: config.mode,
            csrf: CsrfValidator::new(config.csrf_enabled),
        }
    }

    /// Turn CSRF checking on or off. Only meant for initialization, before
    /// the checker is shared.
    pub fn enable_csrf(&mut self, enabled: bool) {
        self.csrf.set_enabled(enabled);
    }

    pub fn config(&self) -> AccessCheckerConfig {
        AccessCheckerConfig {
            csrf_enabled: self.csrf.is_enabled(),
            mode: self.mode,
        }
    }

    pub fn csrf(&self) -> &CsrfValidator {
        &self.csrf
    }

    /// Check that `method` is accessible for the caller of `ctx`.
    ///
    /// Fails only if `method` is not public.
    pub fn check(
        &self,
        method: MethodRef<'_>,
        ctx: &dyn RequestContext,
    ) -> Result<Verdict, AccessError> {
        let verdict = if ctx.is_authenticated() {
            self.verify_authenticated_user(method, ctx)?
        } else {
            self.verify_anonymous_user(method, ctx)?
        };

        if let Verdict::Denied(reason) = verdict {
            tracing::debug!(
                method = %method.qualified_name(),
                authenticated = ctx.is_authenticated(),
                reason = reason.as_str(),
                "Endpoint access denied"
            );
        }
        Ok(verdict)
    }

    /// The entity whose markers govern access to `method`.
    pub fn security_target<'a>(
        &self,
        method: MethodRef<'a>,
    ) -> Result<SecurityTarget<'a>, AccessError> {
        security_target(method)
    }

    fn verify_anonymous_user(
        &self,
        method: MethodRef<'_>,
        ctx: &dyn RequestContext,
    ) -> Result<Verdict, AccessError> {
        let target = self.security_target(method)?;
        if target.annotations().contains(AnnotationKind::AnonymousAllowed)
            && self.can_access_method(target, ctx)
        {
            return Ok(Verdict::Allowed);
        }

        Ok(Verdict::Denied(DenialReason::AnonymousNotAllowed))
    }

    fn verify_authenticated_user(
        &self,
        method: MethodRef<'_>,
        ctx: &dyn RequestContext,
    ) -> Result<Verdict, AccessError> {
        let target = self.security_target(method)?;
        if self.can_access_method(target, ctx) {
            return Ok(Verdict::Allowed);
        }

        let reason = match self.mode {
            DeploymentMode::Development => DenialReason::UnauthorizedWithHint,
            DeploymentMode::Production => DenialReason::Unauthorized,
        };
        Ok(Verdict::Denied(reason))
    }

    fn can_access_method(&self, target: SecurityTarget<'_>, ctx: &dyn RequestContext) -> bool {
        self.csrf.validate(ctx) && annotation_allows_access(target.annotations(), ctx)
    }
}

impl Default for AccessChecker {
    fn default() -> Self {
        Self::new(AccessCheckerConfig::default())
    }
}

/// Evaluate the markers of a resolved target. No marker means no access.
pub fn annotation_allows_access(annotations: &AnnotationSet, ctx: &dyn RequestContext) -> bool {
    if annotations.contains(AnnotationKind::DenyAll) {
        return false;
    }
    if annotations.contains(AnnotationKind::AnonymousAllowed) {
        return true;
    }
    match annotations.roles_allowed() {
        Some(roles) => roles.iter().any(|role| ctx.is_user_in_role(role)),
        None => annotations.contains(AnnotationKind::PermitAll),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Endpoint, EndpointMethod};
    use crate::security::annotations::AccessAnnotation;
    use crate::security::context::SessionAttributes;
    use crate::security::csrf::CSRF_HEADER;
    use crate::session::CSRF_SESSION_ATTRIBUTE;
    use std::collections::{BTreeSet, HashMap};

    struct TestSession(HashMap<String, String>);

    impl SessionAttributes for TestSession {
        fn attribute(&self, name: &str) -> Option<String> {
            self.0.get(name).cloned()
        }
    }

    #[derive(Default)]
    struct TestContext {
        roles: Option<BTreeSet<String>>,
        session: Option<TestSession>,
        csrf_header: Option<String>,
    }

    impl TestContext {
        fn anonymous() -> Self {
            Self::default()
        }

        fn user(roles: &[&str]) -> Self {
            Self {
                roles: Some(roles.iter().map(|r| r.to_string()).collect()),
                ..Self::default()
            }
        }

        fn with_session_token(mut self, token: &str) -> Self {
            let mut attributes = HashMap::new();
            attributes.insert(CSRF_SESSION_ATTRIBUTE.to_string(), token.to_string());
            self.session = Some(TestSession(attributes));
            self
        }

        fn with_csrf_header(mut self, token: &str) -> Self {
            self.csrf_header = Some(token.to_string());
            self
        }
    }

    impl RequestContext for TestContext {
        fn is_authenticated(&self) -> bool {
            self.roles.is_some()
        }

        fn is_user_in_role(&self, role: &str) -> bool {
            self.roles.as_ref().map(|r| r.contains(role)).unwrap_or(false)
        }

        fn session(&self) -> Option<&dyn SessionAttributes> {
            self.session.as_ref().map(|s| s as &dyn SessionAttributes)
        }

        fn header(&self, name: &str) -> Option<&str> {
            if name.eq_ignore_ascii_case(CSRF_HEADER) {
                self.csrf_header.as_deref()
            } else {
                None
            }
        }
    }

    fn demo_endpoint() -> Endpoint {
        Endpoint::new("DemoEndpoint")
            .annotated(AccessAnnotation::DenyAll)
            .method(EndpointMethod::new("method1"))
            .method(EndpointMethod::new("method2").annotated(AccessAnnotation::PermitAll))
            .method(
                EndpointMethod::new("method3")
                    .annotated(AccessAnnotation::roles_allowed(["ROLE_USER"])),
            )
            .method(EndpointMethod::new("method4").annotated(AccessAnnotation::AnonymousAllowed))
            .method(EndpointMethod::new("internal").private())
    }

    fn production() -> AccessChecker {
        AccessChecker::default()
    }

    fn development() -> AccessChecker {
        AccessChecker::new(AccessCheckerConfig {
            csrf_enabled: true,
            mode: DeploymentMode::Development,
        })
    }

    fn check(checker: &AccessChecker, endpoint: &Endpoint, method: &str, ctx: &TestContext) -> Verdict {
        checker.check(endpoint.method_ref(method).unwrap(), ctx).unwrap()
    }

    #[test]
    fn test_endpoint_deny_all_denies_unannotated_method() {
        let endpoint = demo_endpoint();
        let checker = production();

        assert_eq!(
            check(&checker, &endpoint, "method1", &TestContext::user(&["ROLE_USER", "ROLE_ADMIN"])),
            Verdict::Denied(DenialReason::Unauthorized)
        );
        assert_eq!(
            check(&checker, &endpoint, "method1", &TestContext::anonymous()),
            Verdict::Denied(DenialReason::AnonymousNotAllowed)
        );

        let mut no_csrf = production();
        no_csrf.enable_csrf(false);
        assert!(!check(&no_csrf, &endpoint, "method1", &TestContext::user(&["ROLE_USER"])).is_allowed());
    }

    #[test]
    fn test_method_permit_all_overrides_endpoint_deny_all() {
        let endpoint = demo_endpoint();
        assert_eq!(
            check(&production(), &endpoint, "method2", &TestContext::user(&[])),
            Verdict::Allowed
        );
    }

    #[test]
    fn test_permit_all_does_not_admit_anonymous() {
        let endpoint = demo_endpoint();
        assert_eq!(
            check(&production(), &endpoint, "method2", &TestContext::anonymous()),
            Verdict::Denied(DenialReason::AnonymousNotAllowed)
        );
    }

    #[test]
    fn test_roles_allowed_is_any_of() {
        let endpoint = Endpoint::new("Reports").method(
            EndpointMethod::new("summary").annotated(AccessAnnotation::roles_allowed(["A", "B"])),
        );
        let checker = production();

        assert!(check(&checker, &endpoint, "summary", &TestContext::user(&["B"])).is_allowed());
        assert!(check(&checker, &endpoint, "summary", &TestContext::user(&["A", "C"])).is_allowed());
        assert_eq!(
            check(&checker, &endpoint, "summary", &TestContext::user(&["C"])),
            Verdict::Denied(DenialReason::Unauthorized)
        );
    }

    #[test]
    fn test_empty_roles_allowed_denies_everyone() {
        let endpoint = Endpoint::new("Reports").method(
            EndpointMethod::new("summary")
                .annotated(AccessAnnotation::roles_allowed(Vec::<String>::new()))
                .annotated(AccessAnnotation::PermitAll),
        );
        assert!(!check(&production(), &endpoint, "summary", &TestContext::user(&["A"])).is_allowed());
    }

    #[test]
    fn test_anonymous_allowed_admits_everyone() {
        let endpoint = demo_endpoint();
        let checker = production();

        assert!(check(&checker, &endpoint, "method4", &TestContext::anonymous()).is_allowed());
        assert!(check(&checker, &endpoint, "method4", &TestContext::user(&[])).is_allowed());
        // Valid session token.
        assert!(check(
            &checker,
            &endpoint,
            "method4",
            &TestContext::anonymous().with_session_token("T1").with_csrf_header("T1")
        )
        .is_allowed());
    }

    #[test]
    fn test_anonymous_allowed_with_bad_csrf_is_denied() {
        let endpoint = demo_endpoint();
        let ctx = TestContext::anonymous()
            .with_session_token("T1")
            .with_csrf_header("T2");
        assert_eq!(
            check(&production(), &endpoint, "method4", &ctx),
            Verdict::Denied(DenialReason::AnonymousNotAllowed)
        );
    }

    #[test]
    fn test_deny_all_beats_anonymous_allowed_on_same_target() {
        let endpoint = Endpoint::new("Mixed").method(
            EndpointMethod::new("both")
                .annotated(AccessAnnotation::DenyAll)
                .annotated(AccessAnnotation::AnonymousAllowed),
        );
        assert!(!check(&production(), &endpoint, "both", &TestContext::anonymous()).is_allowed());
        assert!(!check(&production(), &endpoint, "both", &TestContext::user(&[])).is_allowed());
    }

    #[test]
    fn test_anonymous_allowed_beats_roles_allowed() {
        let endpoint = Endpoint::new("Mixed").method(
            EndpointMethod::new("open")
                .annotated(AccessAnnotation::AnonymousAllowed)
                .annotated(AccessAnnotation::roles_allowed(["ROLE_ADMIN"])),
        );
        assert!(check(&production(), &endpoint, "open", &TestContext::user(&["ROLE_USER"])).is_allowed());
    }

    #[test]
    fn test_roles_allowed_beats_permit_all() {
        let endpoint = Endpoint::new("Mixed").method(
            EndpointMethod::new("admins")
                .annotated(AccessAnnotation::PermitAll)
                .annotated(AccessAnnotation::roles_allowed(["ROLE_ADMIN"])),
        );
        let checker = production();
        assert!(!check(&checker, &endpoint, "admins", &TestContext::user(&["ROLE_USER"])).is_allowed());
        assert!(check(&checker, &endpoint, "admins", &TestContext::user(&["ROLE_ADMIN"])).is_allowed());
    }

    #[test]
    fn test_no_annotations_is_denied_with_mode_specific_message() {
        let endpoint = Endpoint::new("Plain").method(EndpointMethod::new("call"));
        let user = TestContext::user(&["ROLE_USER"]);

        let verdict = check(&production(), &endpoint, "call", &user);
        assert_eq!(
            verdict.denial_message().as_deref(),
            Some("Unauthorized access to endpoint")
        );

        let verdict = check(&development(), &endpoint, "call", &user);
        assert_eq!(
            verdict.denial_message().as_deref(),
            Some(
                "Unauthorized access to endpoint; to enable endpoint access use one of the \
                 following annotations: @AnonymousAllowed, @PermitAll, @RolesAllowed"
            )
        );
    }

    #[test]
    fn test_anonymous_message_does_not_depend_on_mode() {
        let endpoint = Endpoint::new("Plain").method(EndpointMethod::new("call"));
        let verdict = check(&development(), &endpoint, "call", &TestContext::anonymous());
        assert_eq!(
            verdict.denial_message().as_deref(),
            Some("Anonymous access is not allowed")
        );
    }

    #[test]
    fn test_csrf_failure_denies_authenticated_caller() {
        let endpoint = demo_endpoint();
        let checker = production();
        let ok = TestContext::user(&[]).with_session_token("T1").with_csrf_header("T1");
        let bad = TestContext::user(&[]).with_session_token("T1").with_csrf_header("T2");
        let missing = TestContext::user(&[]).with_session_token("T1");

        assert!(check(&checker, &endpoint, "method2", &ok).is_allowed());
        assert_eq!(
            check(&checker, &endpoint, "method2", &bad),
            Verdict::Denied(DenialReason::Unauthorized)
        );
        assert!(!check(&checker, &endpoint, "method2", &missing).is_allowed());
    }

    #[test]
    fn test_disabled_csrf_ignores_token_mismatch() {
        let endpoint = demo_endpoint();
        let mut checker = production();
        checker.enable_csrf(false);
        assert!(!checker.config().csrf_enabled);

        let bad = TestContext::user(&[]).with_session_token("T1").with_csrf_header("T2");
        assert!(check(&checker, &endpoint, "method2", &bad).is_allowed());
    }

    #[test]
    fn test_non_public_method_fails() {
        let endpoint = demo_endpoint();
        let target = endpoint.method_ref("internal").unwrap();

        let err = production().check(target, &TestContext::user(&[])).unwrap_err();
        assert!(matches!(err, AccessError::InvalidTarget { .. }));
        assert!(production().check(target, &TestContext::anonymous()).is_err());
    }

    #[test]
    fn test_verdict_denial_message() {
        assert_eq!(Verdict::Allowed.denial_message(), None);
        assert_eq!(
            Verdict::Denied(DenialReason::AnonymousNotAllowed).denial_message().as_deref(),
            Some("Anonymous access is not allowed")
        );
    }
}
