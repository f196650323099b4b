//! Relation-data exchange protocol for the SMTP relay integrator.
//!
//! This crate provides:
//!
//! - **Wire codec**: legacy and modern encodings of the configuration bundle
//! - **Provider**: the idempotent reconciliation loop, including the
//!   managed-password secret reconciler
//! - **Requirer**: the event pipeline turning data-bag and secret changes
//!   into resolved domain events
//! - **Store traits**: the narrow collaborator interfaces the core depends
//!   on, with in-memory implementations

pub mod error;
pub mod memory;
pub mod provider;
pub mod requirer;
pub mod store;
pub mod wire;

pub use error::{ProviderError, RequirerError};
pub use memory::{InMemoryPeerStore, InMemoryRelationStore, InMemorySecretStore};
pub use provider::{Provider, Trigger, LEGACY_ENDPOINT, MODERN_ENDPOINT, SECRET_ID_KEY};
pub use requirer::{Requirer, SmtpDataAvailable};
pub use store::{DataBag, PeerStore, RelationId, RelationStore, SecretContent, SecretStore, StoreError};
pub use wire::{decode, encode_legacy, encode_modern, DecodeError};
