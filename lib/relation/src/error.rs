//! Error types for the provider and requirer sides of the protocol.

use crate::store::StoreError;
use smtp_integrator_core::ConfigError;
use std::fmt;

/// Errors from the provider reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The operator-supplied configuration is invalid. Surfaced as a
    /// blocking condition; reconciliation aborted with no partial writes.
    InvalidConfig(ConfigError),
    /// A required collaborator is not available yet. Surfaced as a waiting
    /// condition; expected to resolve on a later lifecycle event.
    NotReady { reason: String },
    /// An external store failed.
    Store(StoreError),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(err) => write!(f, "invalid configuration: {err}"),
            Self::NotReady { reason } => write!(f, "not ready: {reason}"),
            Self::Store(err) => write!(f, "store error: {err}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ConfigError> for ProviderError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err)
    }
}

impl From<StoreError> for ProviderError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Errors from the requirer event pipeline.
///
/// Absent or malformed relation data is not an error on the requirer side;
/// those cases produce no event. These variants only cover the anomaly where
/// data looks complete but its secret reference cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirerError {
    /// The data-bag carries a secret reference but this host has no secret
    /// store to resolve it with.
    SecretsUnsupported { reference: String },
    /// The secret reference did not resolve to usable content.
    SecretResolution { reference: String, reason: String },
}

impl fmt::Display for RequirerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretsUnsupported { reference } => {
                write!(f, "cannot resolve secret '{reference}': secrets unsupported")
            }
            Self::SecretResolution { reference, reason } => {
                write!(f, "failed to resolve secret '{reference}': {reason}")
            }
        }
    }
}

impl std::error::Error for RequirerError {}
