//! Security target resolution.
//!
//! Only two levels are considered: the method and its declaring endpoint.
//! If the method declares any access marker, its markers replace the
//! endpoint's entirely; markers are never merged per kind.

use serde::Serialize;

use crate::endpoint::{Endpoint, EndpointMethod, MethodRef};
use crate::security::annotations::AnnotationSet;
use crate::security::error::AccessError;

/// The entity whose markers govern access to a method call.
#[derive(Debug, Clone, Copy)]
pub enum SecurityTarget<'a> {
    Method(&'a EndpointMethod),
    Endpoint(&'a Endpoint),
}

impl<'a> SecurityTarget<'a> {
    pub fn annotations(&self) -> &'a AnnotationSet {
        match *self {
            SecurityTarget::Method(method) => method.annotations(),
            SecurityTarget::Endpoint(endpoint) => endpoint.annotations(),
        }
    }

    pub fn level(&self) -> TargetLevel {
        match self {
            SecurityTarget::Method(_) => TargetLevel::Method,
            SecurityTarget::Endpoint(_) => TargetLevel::Endpoint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetLevel {
    Method,
    Endpoint,
}

/// Resolve the security target of a method.
pub fn security_target(target: MethodRef<'_>) -> Result<SecurityTarget<'_>, AccessError> {
    if !target.method.is_public() {
        return Err(AccessError::InvalidTarget {
            method: target.qualified_name(),
        });
    }

    if target.method.annotations().has_security_annotation() {
        Ok(SecurityTarget::Method(target.method))
    } else {
        Ok(SecurityTarget::Endpoint(target.endpoint))
    }
}
