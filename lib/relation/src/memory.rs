//! In-memory store implementations.
//!
//! Used by the test suite and by embedders running without a real host
//! runtime. The secret store tracks a revision counter per secret so the
//! idempotence properties of the provider loop are observable.

use crate::store::{DataBag, PeerStore, RelationId, RelationStore, SecretContent, SecretStore, StoreError};
use smtp_integrator_core::SecretRef;
use std::collections::{BTreeMap, BTreeSet};
use ulid::Ulid;

/// An in-memory relation store.
#[derive(Debug, Default)]
pub struct InMemoryRelationStore {
    endpoints: BTreeMap<RelationId, String>,
    bags: BTreeMap<RelationId, DataBag>,
    next_id: u64,
}

impl InMemoryRelationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Establishes a new relation on an endpoint.
    pub fn add_relation(&mut self, endpoint: &str) -> RelationId {
        let relation = RelationId::new(self.next_id);
        self.next_id += 1;
        self.endpoints.insert(relation, endpoint.to_string());
        self.bags.insert(relation, DataBag::new());
        relation
    }

    /// Removes a relation entirely.
    pub fn remove_relation(&mut self, relation: RelationId) {
        self.endpoints.remove(&relation);
        self.bags.remove(&relation);
    }

    /// Seeds a relation's data-bag directly, as a remote peer would.
    pub fn set_bag(&mut self, relation: RelationId, bag: DataBag) {
        self.bags.insert(relation, bag);
    }

    /// Reads a relation's data-bag without going through the trait.
    #[must_use]
    pub fn bag(&self, relation: RelationId) -> Option<&DataBag> {
        self.bags.get(&relation)
    }
}

impl RelationStore for InMemoryRelationStore {
    fn relations(&self, endpoint: &str) -> Vec<RelationId> {
        self.endpoints
            .iter()
            .filter(|(_, name)| name.as_str() == endpoint)
            .map(|(relation, _)| *relation)
            .collect()
    }

    fn load(&self, relation: RelationId) -> Result<DataBag, StoreError> {
        self.bags
            .get(&relation)
            .cloned()
            .ok_or(StoreError::RelationNotFound { relation })
    }

    fn store(&mut self, relation: RelationId, data: DataBag) -> Result<(), StoreError> {
        if !self.endpoints.contains_key(&relation) {
            return Err(StoreError::RelationNotFound { relation });
        }
        self.bags.insert(relation, data);
        Ok(())
    }
}

#[derive(Debug)]
struct SecretRecord {
    reference: SecretRef,
    content: SecretContent,
    revisions: u64,
    granted: BTreeSet<RelationId>,
}

/// An in-memory secret store.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Vec<SecretRecord>,
}

impl InMemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a pre-existing secret under a caller-chosen reference, as when
    /// an operator supplies a secret created out of band.
    pub fn insert(&mut self, reference: SecretRef, content: SecretContent) {
        self.secrets.push(SecretRecord {
            reference,
            content,
            revisions: 1,
            granted: BTreeSet::new(),
        });
    }

    /// Number of content revisions a secret has gone through.
    #[must_use]
    pub fn revisions(&self, reference: &SecretRef) -> Option<u64> {
        self.find(reference).map(|record| record.revisions)
    }

    /// Relations currently granted read access to a secret.
    #[must_use]
    pub fn granted(&self, reference: &SecretRef) -> Vec<RelationId> {
        self.find(reference)
            .map(|record| record.granted.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of secrets held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether the store holds no secrets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    fn find(&self, reference: &SecretRef) -> Option<&SecretRecord> {
        self.secrets
            .iter()
            .find(|record| record.reference.same_secret(reference))
    }

    fn find_mut(&mut self, reference: &SecretRef) -> Option<&mut SecretRecord> {
        self.secrets
            .iter_mut()
            .find(|record| record.reference.same_secret(reference))
    }
}

impl SecretStore for InMemorySecretStore {
    fn create(&mut self, content: SecretContent) -> Result<SecretRef, StoreError> {
        let reference = SecretRef::new(format!("secret:{}", Ulid::new().to_string().to_lowercase()));
        self.secrets.push(SecretRecord {
            reference: reference.clone(),
            content,
            revisions: 1,
            granted: BTreeSet::new(),
        });
        Ok(reference)
    }

    fn read(&self, reference: &SecretRef) -> Result<SecretContent, StoreError> {
        self.find(reference)
            .map(|record| record.content.clone())
            .ok_or_else(|| StoreError::SecretNotFound {
                reference: reference.to_string(),
            })
    }

    fn update(&mut self, reference: &SecretRef, content: SecretContent) -> Result<(), StoreError> {
        let record = self
            .find_mut(reference)
            .ok_or_else(|| StoreError::SecretNotFound {
                reference: reference.to_string(),
            })?;
        record.content = content;
        record.revisions += 1;
        Ok(())
    }

    fn grant(&mut self, reference: &SecretRef, relation: RelationId) -> Result<(), StoreError> {
        let record = self
            .find_mut(reference)
            .ok_or_else(|| StoreError::SecretNotFound {
                reference: reference.to_string(),
            })?;
        record.granted.insert(relation);
        Ok(())
    }

    fn revoke(&mut self, reference: &SecretRef, relation: RelationId) -> Result<(), StoreError> {
        let record = self
            .find_mut(reference)
            .ok_or_else(|| StoreError::SecretNotFound {
                reference: reference.to_string(),
            })?;
        record.granted.remove(&relation);
        Ok(())
    }
}

/// An in-memory peer-scoped key-value store.
#[derive(Debug, Default)]
pub struct InMemoryPeerStore {
    values: BTreeMap<String, String>,
}

impl InMemoryPeerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerStore for InMemoryPeerStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}
