//! Configuration error types.
//!
//! A configuration that fails validation is never constructible; every
//! failure surfaces as a `ConfigError` naming the offending field so the
//! operator can correct it.

use std::fmt;

/// Errors from validating the operator-supplied SMTP configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required field is absent.
    MissingField { field: &'static str },
    /// A field is present but failed its validator.
    InvalidField { field: &'static str, reason: String },
    /// Two mutually exclusive fields are both set.
    ConflictingFields {
        first: &'static str,
        second: &'static str,
    },
    /// A directly-configured secret reference cannot be used.
    UnusableSecretRef { reference: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => {
                write!(f, "missing required configuration field '{field}'")
            }
            Self::InvalidField { field, reason } => {
                write!(f, "invalid configuration field '{field}': {reason}")
            }
            Self::ConflictingFields { first, second } => {
                write!(f, "configuration fields '{first}' and '{second}' are mutually exclusive")
            }
            Self::UnusableSecretRef { reference, reason } => {
                write!(f, "unusable secret reference '{reference}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
