//! Errors raised by the access checker.

use thiserror::Error;

/// Caller errors. Denied access is a [`Verdict`](crate::security::Verdict),
/// not an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("The method '{method}' is not public hence cannot have a security target")]
    InvalidTarget { method: String },
}
