//! Opaque secret references.
//!
//! Secret references are handed out by the external secret store and stored
//! verbatim. The same secret can be named by several textual forms (with or
//! without a URI scheme, with or without an owning-entity prefix), so
//! equality checks go through a normalization step. Normalization is never
//! applied to stored values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque reference to externally-stored secret content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(String);

impl SecretRef {
    /// Wraps a reference string as received, verbatim.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The reference exactly as it was received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether two references name the same secret, regardless of
    /// textual form.
    ///
    /// `secret://<owner>/<id>`, `secret:<id>` and a bare `<id>` all compare
    /// equal when `<id>` matches.
    #[must_use]
    pub fn same_secret(&self, other: &SecretRef) -> bool {
        self.normalized() == other.normalized()
    }

    fn normalized(&self) -> &str {
        let stripped = self
            .0
            .strip_prefix("secret://")
            .or_else(|| self.0.strip_prefix("secret:"))
            .unwrap_or(&self.0);
        stripped.rsplit('/').next().unwrap_or(stripped)
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SecretRef {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
