//! Collaborator store interfaces.
//!
//! The protocol core depends only on these narrow traits, never on a
//! concrete runtime type. All operations are synchronous: the host runtime
//! serializes lifecycle events into one handler invocation at a time, so
//! there is no internal parallelism to cover.

use serde::{Deserialize, Serialize};
use smtp_integrator_core::SecretRef;
use std::collections::BTreeMap;
use std::fmt;

/// A relation data-bag: the flat string-to-string mapping written by the
/// provider side and read by the requirer side.
///
/// Ordered so repeated writes of the same bundle are byte-identical.
pub type DataBag = BTreeMap<String, String>;

/// Structured secret content, as a flat string map.
///
/// The protocol's expected shape is the single key `password`.
pub type SecretContent = BTreeMap<String, String>;

/// Identifier of a relation endpoint instance, assigned by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(u64);

impl RelationId {
    /// Wraps a runtime-assigned relation id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relation-{}", self.0)
    }
}

/// Errors from the external stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The relation does not exist (or has gone away).
    RelationNotFound { relation: RelationId },
    /// The secret reference does not resolve to a stored secret.
    SecretNotFound { reference: String },
    /// The backing service failed.
    Backend { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelationNotFound { relation } => {
                write!(f, "relation not found: {relation}")
            }
            Self::SecretNotFound { reference } => {
                write!(f, "secret not found: {reference}")
            }
            Self::Backend { reason } => write!(f, "store backend error: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Access to relation endpoints and their per-application data-bags.
pub trait RelationStore {
    /// Enumerates the relations currently established on an endpoint.
    fn relations(&self, endpoint: &str) -> Vec<RelationId>;

    /// Reads the data-bag published on a relation.
    fn load(&self, relation: RelationId) -> Result<DataBag, StoreError>;

    /// Replaces this application's data-bag on a relation.
    fn store(&mut self, relation: RelationId, data: DataBag) -> Result<(), StoreError>;
}

/// Access to the external secret store.
pub trait SecretStore {
    /// Creates a secret with the given content and returns its reference.
    fn create(&mut self, content: SecretContent) -> Result<SecretRef, StoreError>;

    /// Reads the current content of a secret.
    fn read(&self, reference: &SecretRef) -> Result<SecretContent, StoreError>;

    /// Replaces the content of a secret, producing a new revision.
    fn update(&mut self, reference: &SecretRef, content: SecretContent) -> Result<(), StoreError>;

    /// Grants a relation read access to a secret.
    fn grant(&mut self, reference: &SecretRef, relation: RelationId) -> Result<(), StoreError>;

    /// Revokes a relation's read access to a secret.
    fn revoke(&mut self, reference: &SecretRef, relation: RelationId) -> Result<(), StoreError>;
}

/// The peer-relation-scoped key-value slot surviving process restarts.
pub trait PeerStore {
    /// Reads a stored value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a value.
    fn set(&mut self, key: &str, value: &str);

    /// Removes a value.
    fn remove(&mut self, key: &str);
}
