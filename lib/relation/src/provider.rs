//! Provider-side reconciliation loop.
//!
//! Every relevant lifecycle trigger funnels into [`Provider::reconcile`],
//! which recomputes the bundle from configuration, re-derives secret state
//! and rewrites relation data for every related peer on both protocol
//! variants. The loop is idempotent: running twice with unchanged inputs
//! produces no new secret revisions and byte-identical data-bags.

use crate::error::ProviderError;
use crate::store::{PeerStore, RelationId, RelationStore, SecretContent, SecretStore};
use crate::wire;
use smtp_integrator_core::{ConfigError, RelayOptions, SecretRef, SmtpConfig};
use tracing::{debug, info, warn};

/// Endpoint carrying the legacy protocol variant.
pub const LEGACY_ENDPOINT: &str = "smtp-legacy";

/// Endpoint carrying the modern protocol variant.
pub const MODERN_ENDPOINT: &str = "smtp";

/// Peer-store slot remembering the managed secret's identity.
pub const SECRET_ID_KEY: &str = "secret-id";

/// A lifecycle trigger dispatched by the host runtime.
///
/// All triggers funnel into the same reconciliation pass; the kind only
/// matters for relation-removal, which additionally revokes secret access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The operator changed the configuration.
    ConfigChanged,
    /// A relation was established.
    RelationCreated(RelationId),
    /// A relation is being removed.
    RelationBroken(RelationId),
    /// This instance gained or lost leadership.
    LeadershipChanged,
    /// Periodic status refresh.
    UpdateStatus,
}

/// The provider side of the SMTP relation protocol.
///
/// Owns the collaborator stores. A `None` secret store means the host lacks
/// secret primitives: modern-protocol relations are then left unpopulated
/// while legacy relations still update. A `None` peer store means the
/// peer relation has not been joined yet.
pub struct Provider<R, S, P> {
    relations: R,
    secrets: Option<S>,
    peers: Option<P>,
    leader: bool,
}

impl<R, S, P> Provider<R, S, P>
where
    R: RelationStore,
    S: SecretStore,
    P: PeerStore,
{
    /// Creates a provider over the given collaborator stores.
    ///
    /// Starts as a non-leader; mutation only happens once
    /// [`Provider::set_leader`] has been called with `true`.
    #[must_use]
    pub fn new(relations: R, secrets: Option<S>, peers: Option<P>) -> Self {
        Self {
            relations,
            secrets,
            peers,
            leader: false,
        }
    }

    /// Records the leadership verdict for subsequent passes.
    pub fn set_leader(&mut self, leader: bool) {
        self.leader = leader;
    }

    /// Whether this instance currently holds write authority.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// The relation store.
    #[must_use]
    pub fn relation_store(&self) -> &R {
        &self.relations
    }

    /// The secret store, when the host supports secrets.
    #[must_use]
    pub fn secret_store(&self) -> Option<&S> {
        self.secrets.as_ref()
    }

    /// The peer-scoped key-value store, when available.
    #[must_use]
    pub fn peer_store(&self) -> Option<&P> {
        self.peers.as_ref()
    }

    /// Runs one reconciliation pass.
    ///
    /// Non-leaders treat every trigger as a pure no-op. Configuration is
    /// validated once, up front; on failure nothing is written and prior
    /// relation/secret state is left intact. Legacy relations are updated
    /// first, then modern ones.
    ///
    /// # Errors
    ///
    /// [`ProviderError::InvalidConfig`] for a configuration that fails
    /// validation (including an unusable operator-supplied secret
    /// reference), [`ProviderError::NotReady`] when the peer store is
    /// required but absent, [`ProviderError::Store`] on store failures.
    pub fn reconcile(
        &mut self,
        options: &RelayOptions,
        trigger: Trigger,
    ) -> Result<(), ProviderError> {
        if !self.leader {
            debug!(?trigger, "not the leader, skipping reconciliation");
            return Ok(());
        }

        let config = SmtpConfig::new(options)?;
        let broken = match trigger {
            Trigger::RelationBroken(relation) => Some(relation),
            _ => None,
        };

        let (legacy, modern) = self.resolve_bundles(&config)?;

        if let (Some(relation), Some(reference)) = (broken, modern.password_ref()) {
            if let Some(secrets) = self.secrets.as_mut() {
                if let Err(err) = secrets.revoke(reference, relation) {
                    warn!(%relation, %err, "failed to revoke secret access from departing relation");
                }
            }
        }

        for relation in self.relations.relations(LEGACY_ENDPOINT) {
            if broken == Some(relation) {
                continue;
            }
            self.relations.store(relation, wire::encode_legacy(&legacy))?;
        }

        if let Some(secrets) = self.secrets.as_mut() {
            for relation in self.relations.relations(MODERN_ENDPOINT) {
                if broken == Some(relation) {
                    continue;
                }
                self.relations.store(relation, wire::encode_modern(&modern))?;
                if let Some(reference) = modern.password_ref() {
                    secrets.grant(reference, relation)?;
                }
            }
        } else {
            debug!("secret primitives unavailable, leaving modern relations unpopulated");
        }

        Ok(())
    }

    /// Derives the per-protocol bundles from the validated configuration.
    ///
    /// An operator-supplied secret reference is resolved to plaintext for
    /// the legacy variant and passed through verbatim for the modern one;
    /// a plaintext password goes through the managed-secret reconciler.
    fn resolve_bundles(
        &mut self,
        config: &SmtpConfig,
    ) -> Result<(SmtpConfig, SmtpConfig), ProviderError> {
        if let Some(reference) = config.password_ref().cloned() {
            // The operator now names the secret directly; any secret this
            // provider managed for a previous plaintext password is obsolete.
            self.release_managed_secret();
            let secrets =
                self.secrets
                    .as_ref()
                    .ok_or_else(|| ConfigError::UnusableSecretRef {
                        reference: reference.to_string(),
                        reason: "secret support is unavailable on this host".to_string(),
                    })?;
            let content =
                secrets
                    .read(&reference)
                    .map_err(|err| ConfigError::UnusableSecretRef {
                        reference: reference.to_string(),
                        reason: err.to_string(),
                    })?;
            let password = content
                .get(wire::keys::PASSWORD)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigError::UnusableSecretRef {
                    reference: reference.to_string(),
                    reason: "content is missing the 'password' key".to_string(),
                })?
                .clone();
            return Ok((config.clone().with_password(password), config.clone()));
        }

        let modern = match self.ensure_password_secret(config)? {
            Some(reference) => config.clone().with_password_ref(reference),
            None => config.clone(),
        };
        Ok((config.clone(), modern))
    }

    /// Maintains exactly one durable secret holding the configured password.
    ///
    /// Creates the secret lazily on first need, updates its content only on
    /// an actual mismatch (so no-op passes produce no new revisions), and
    /// remembers its reference in the peer store under [`SECRET_ID_KEY`].
    /// A cleared password revokes all grants and forgets the stored
    /// reference, leaving the secret's lifecycle to the external store.
    fn ensure_password_secret(
        &mut self,
        config: &SmtpConfig,
    ) -> Result<Option<SecretRef>, ProviderError> {
        let Some(password) = config.password() else {
            self.release_managed_secret();
            return Ok(None);
        };

        let Some(secrets) = self.secrets.as_mut() else {
            return Ok(None);
        };

        let peers = self.peers.as_mut().ok_or_else(|| ProviderError::NotReady {
            reason: "peer relation store is not available yet".to_string(),
        })?;

        let desired: SecretContent =
            [(wire::keys::PASSWORD.to_string(), password.to_string())].into();

        if let Some(raw) = peers.get(SECRET_ID_KEY) {
            let reference = SecretRef::new(raw);
            match secrets.read(&reference) {
                Ok(current) => {
                    if current != desired {
                        secrets.update(&reference, desired)?;
                        info!(%reference, "updated password secret content");
                    }
                    return Ok(Some(reference));
                }
                Err(err) => {
                    warn!(%reference, %err, "recorded secret is unusable, creating a replacement");
                }
            }
        }

        let reference = secrets.create(desired)?;
        peers.set(SECRET_ID_KEY, reference.as_str());
        info!(%reference, "created password secret");
        Ok(Some(reference))
    }

    /// Revokes all grants on the managed password secret and forgets its
    /// stored reference. No-op when nothing is recorded.
    fn release_managed_secret(&mut self) {
        let Some(secrets) = self.secrets.as_mut() else {
            return;
        };
        let Some(peers) = self.peers.as_mut() else {
            return;
        };
        if let Some(raw) = peers.get(SECRET_ID_KEY) {
            let reference = SecretRef::new(raw);
            for relation in self.relations.relations(MODERN_ENDPOINT) {
                if let Err(err) = secrets.revoke(&reference, relation) {
                    warn!(%relation, %err, "failed to revoke stale secret access");
                }
            }
            peers.remove(SECRET_ID_KEY);
            info!(%reference, "released managed password secret");
        }
    }
}
