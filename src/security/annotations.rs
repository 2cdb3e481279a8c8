//! Access annotations attached to endpoints and endpoint methods.
//!
//! # Responsibilities
//! - Define the closed set of access markers
//! - Hold the markers declared on a single target (endpoint or method)
//! - Deserialize markers from flat config keys
//!
//! # Design Decisions
//! - Presence, not count: a set holds at most one marker of each kind
//! - Roles are kept sorted so listings and logs are deterministic
//! - Populated at registration time, never mutated while serving

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single access marker declared on a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessAnnotation {
    /// Callable without an authenticated principal.
    AnonymousAllowed,
    /// Callable by any authenticated principal.
    PermitAll,
    /// Never callable.
    DenyAll,
    /// Callable by principals holding at least one of the roles.
    RolesAllowed(BTreeSet<String>),
}

impl AccessAnnotation {
    /// Shorthand for building a `RolesAllowed` marker.
    pub fn roles_allowed<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessAnnotation::RolesAllowed(roles.into_iter().map(Into::into).collect())
    }
}

/// Marker kinds without payload, used for presence queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    AnonymousAllowed,
    PermitAll,
    DenyAll,
    RolesAllowed,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 4] = [
        AnnotationKind::AnonymousAllowed,
        AnnotationKind::PermitAll,
        AnnotationKind::DenyAll,
        AnnotationKind::RolesAllowed,
    ];

    /// Kinds that can grant access when added to a target.
    pub const GRANTING: [AnnotationKind; 3] = [
        AnnotationKind::AnonymousAllowed,
        AnnotationKind::PermitAll,
        AnnotationKind::RolesAllowed,
    ];
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnnotationKind::AnonymousAllowed => "@AnonymousAllowed",
            AnnotationKind::PermitAll => "@PermitAll",
            AnnotationKind::DenyAll => "@DenyAll",
            AnnotationKind::RolesAllowed => "@RolesAllowed",
        };
        f.write_str(name)
    }
}

/// The markers declared directly on one target.
///
/// In config files the set is written as flat keys on the endpoint or method
/// table:
///
/// ```toml
/// deny_all = true
/// roles_allowed = ["ROLE_ADMIN"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnnotationSet {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub anonymous_allowed: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub permit_all: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deny_all: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles_allowed: Option<BTreeSet<String>>,
}

impl AnnotationSet {
    /// An empty set (no access markers).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a marker. A second `RolesAllowed` replaces the first.
    pub fn insert(&mut self, annotation: AccessAnnotation) {
        match annotation {
            AccessAnnotation::AnonymousAllowed => self.anonymous_allowed = true,
            AccessAnnotation::PermitAll => self.permit_all = true,
            AccessAnnotation::DenyAll => self.deny_all = true,
            AccessAnnotation::RolesAllowed(roles) => self.roles_allowed = Some(roles),
        }
    }

    /// Builder-style variant of [`AnnotationSet::insert`].
    pub fn with(mut self, annotation: AccessAnnotation) -> Self {
        self.insert(annotation);
        self
    }

    pub fn contains(&self, kind: AnnotationKind) -> bool {
        match kind {
            AnnotationKind::AnonymousAllowed => self.anonymous_allowed,
            AnnotationKind::PermitAll => self.permit_all,
            AnnotationKind::DenyAll => self.deny_all,
            AnnotationKind::RolesAllowed => self.roles_allowed.is_some(),
        }
    }

    pub fn roles_allowed(&self) -> Option<&BTreeSet<String>> {
        self.roles_allowed.as_ref()
    }

    /// True if any of the four marker kinds is present.
    pub fn has_security_annotation(&self) -> bool {
        AnnotationKind::ALL.iter().any(|kind| self.contains(*kind))
    }

    /// Kinds present in this set, in declaration order.
    pub fn kinds(&self) -> Vec<AnnotationKind> {
        AnnotationKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }
}

impl FromIterator<AccessAnnotation> for AnnotationSet {
    fn from_iter<T: IntoIterator<Item = AccessAnnotation>>(iter: T) -> Self {
        let mut set = AnnotationSet::new();
        for annotation in iter {
            set.insert(annotation);
        }
        set
    }
}
