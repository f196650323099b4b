//! Requirer-side event pipeline.
//!
//! Observes relation data-bag changes and secret-content changes, decodes
//! them into a resolved bundle and emits at most one domain event per
//! observed change. "No data yet" and "malformed peer data" are silent;
//! only a broken secret reference on otherwise-complete data is an error.

use crate::error::RequirerError;
use crate::store::{RelationId, RelationStore, SecretStore};
use crate::wire::{self, keys};
use smtp_integrator_core::{AuthType, SecretRef, SmtpConfig, TransportSecurity};
use tracing::debug;

/// Event emitted when a complete, resolved SMTP configuration is available
/// on a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpDataAvailable {
    relation: RelationId,
    config: SmtpConfig,
}

impl SmtpDataAvailable {
    /// The relation the data arrived on.
    #[must_use]
    pub fn relation(&self) -> RelationId {
        self.relation
    }

    /// Hostname or IP address of the relay.
    #[must_use]
    pub fn host(&self) -> &str {
        self.config.host()
    }

    /// Relay port.
    #[must_use]
    pub fn port(&self) -> u32 {
        self.config.port()
    }

    /// SMTP AUTH user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.config.user()
    }

    /// Resolved plaintext password, if the provider shared one.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.config.password()
    }

    /// Authentication mechanism.
    #[must_use]
    pub fn auth_type(&self) -> AuthType {
        self.config.auth_type()
    }

    /// Transport security protocol.
    #[must_use]
    pub fn transport_security(&self) -> TransportSecurity {
        self.config.transport_security()
    }

    /// Envelope domain, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.config.domain()
    }

    /// Sender address, if any.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.config.sender()
    }

    /// Validated recipient addresses; always a list, never null.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        self.config.recipients()
    }

    /// Whether TLS certificate verification is skipped.
    #[must_use]
    pub fn skip_tls_verify(&self) -> bool {
        self.config.skip_tls_verify()
    }
}

/// The requirer side of the SMTP relation protocol.
pub struct Requirer<R, S> {
    relations: R,
    secrets: Option<S>,
    endpoint: String,
}

impl<R, S> Requirer<R, S>
where
    R: RelationStore,
    S: SecretStore,
{
    /// Creates a requirer observing the given endpoint.
    #[must_use]
    pub fn new(relations: R, secrets: Option<S>, endpoint: impl Into<String>) -> Self {
        Self {
            relations,
            secrets,
            endpoint: endpoint.into(),
        }
    }

    /// The endpoint this requirer observes.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Handles a data-bag change on a relation.
    ///
    /// Returns `Ok(None)` when the peer has not published yet or published
    /// something that does not decode; a misconfigured peer must not crash
    /// the consumer. Returns an event with the fully-resolved bundle
    /// otherwise.
    ///
    /// # Errors
    ///
    /// A [`RequirerError`] when the bag carries a secret reference that
    /// cannot be resolved: by that point the data looked complete, so the
    /// anomaly is surfaced rather than swallowed.
    pub fn relation_changed(
        &self,
        relation: RelationId,
    ) -> Result<Option<SmtpDataAvailable>, RequirerError> {
        let Ok(bag) = self.relations.load(relation) else {
            return Ok(None);
        };
        let config = match wire::decode(&bag) {
            Ok(Some(config)) => config,
            Ok(None) => return Ok(None),
            Err(err) => {
                debug!(%relation, %err, "ignoring undecodable relation data");
                return Ok(None);
            }
        };
        let config = self.resolve(config)?;
        Ok(Some(SmtpDataAvailable { relation, config }))
    }

    /// Handles a secret-content-changed notification.
    ///
    /// The notification is keyed by the changed secret's reference, not by
    /// relation; it is mapped back to the owning relation(s) by comparing
    /// against each bag's `password_id` with normalized reference equality.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures from the re-emission path.
    pub fn secret_changed(
        &self,
        reference: &SecretRef,
    ) -> Result<Vec<SmtpDataAvailable>, RequirerError> {
        let mut events = Vec::new();
        for relation in self.relations.relations(&self.endpoint) {
            let Ok(bag) = self.relations.load(relation) else {
                continue;
            };
            let Some(stored) = bag.get(keys::PASSWORD_ID) else {
                continue;
            };
            if !SecretRef::new(stored.as_str()).same_secret(reference) {
                continue;
            }
            if let Some(event) = self.relation_changed(relation)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Resolves a secret reference in the bundle to its plaintext content.
    fn resolve(&self, config: SmtpConfig) -> Result<SmtpConfig, RequirerError> {
        let Some(reference) = config.password_ref().cloned() else {
            return Ok(config);
        };
        let Some(secrets) = self.secrets.as_ref() else {
            return Err(RequirerError::SecretsUnsupported {
                reference: reference.to_string(),
            });
        };
        let content = secrets
            .read(&reference)
            .map_err(|err| RequirerError::SecretResolution {
                reference: reference.to_string(),
                reason: err.to_string(),
            })?;
        let password = content
            .get(keys::PASSWORD)
            .ok_or_else(|| RequirerError::SecretResolution {
                reference: reference.to_string(),
                reason: "content is missing the 'password' key".to_string(),
            })?;
        Ok(config.with_password(password.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryRelationStore, InMemorySecretStore};
    use crate::provider::MODERN_ENDPOINT;
    use crate::store::DataBag;

    type TestRequirer = Requirer<InMemoryRelationStore, InMemorySecretStore>;

    fn base_bag() -> DataBag {
        let mut bag = DataBag::new();
        bag.insert("host".to_string(), "example.smtp".to_string());
        bag.insert("port".to_string(), "25".to_string());
        bag.insert("user".to_string(), "example_user".to_string());
        bag.insert("auth_type".to_string(), "plain".to_string());
        bag.insert("transport_security".to_string(), "tls".to_string());
        bag.insert("domain".to_string(), "domain".to_string());
        bag
    }

    #[test]
    fn no_data_emits_nothing() {
        let mut relations = InMemoryRelationStore::new();
        let relation = relations.add_relation(MODERN_ENDPOINT);
        let requirer: TestRequirer = Requirer::new(relations, None, MODERN_ENDPOINT);

        assert_eq!(requirer.relation_changed(relation).expect("silent"), None);
    }

    #[test]
    fn unknown_relation_emits_nothing() {
        let requirer: TestRequirer =
            Requirer::new(InMemoryRelationStore::new(), None, MODERN_ENDPOINT);
        assert_eq!(
            requirer
                .relation_changed(RelationId::new(42))
                .expect("silent"),
            None
        );
    }

    #[test]
    fn malformed_data_is_silently_ignored() {
        let mut relations = InMemoryRelationStore::new();
        let relation = relations.add_relation(MODERN_ENDPOINT);
        let mut bag = base_bag();
        bag.insert("port".to_string(), "not-a-port".to_string());
        relations.set_bag(relation, bag);
        let requirer: TestRequirer = Requirer::new(relations, None, MODERN_ENDPOINT);

        assert_eq!(requirer.relation_changed(relation).expect("silent"), None);
    }

    #[test]
    fn complete_data_emits_one_event() {
        let mut relations = InMemoryRelationStore::new();
        let relation = relations.add_relation(MODERN_ENDPOINT);
        let mut bag = base_bag();
        bag.insert("password".to_string(), "somepassword".to_string());
        bag.insert(
            "recipients".to_string(),
            r#"["a@x.com","b@y.com"]"#.to_string(),
        );
        relations.set_bag(relation, bag);
        let requirer: TestRequirer = Requirer::new(relations, None, MODERN_ENDPOINT);

        let event = requirer
            .relation_changed(relation)
            .expect("decode")
            .expect("event");
        assert_eq!(event.relation(), relation);
        assert_eq!(event.host(), "example.smtp");
        assert_eq!(event.port(), 25);
        assert_eq!(event.user(), Some("example_user"));
        assert_eq!(event.password(), Some("somepassword"));
        assert_eq!(event.auth_type(), AuthType::Plain);
        assert_eq!(event.transport_security(), TransportSecurity::Tls);
        assert_eq!(event.domain(), Some("domain"));
        assert_eq!(event.recipients(), ["a@x.com", "b@y.com"]);
        assert!(!event.skip_tls_verify());
    }

    #[test]
    fn absent_recipients_normalize_to_empty_list() {
        let mut relations = InMemoryRelationStore::new();
        let relation = relations.add_relation(MODERN_ENDPOINT);
        relations.set_bag(relation, base_bag());
        let requirer: TestRequirer = Requirer::new(relations, None, MODERN_ENDPOINT);

        let event = requirer
            .relation_changed(relation)
            .expect("decode")
            .expect("event");
        assert!(event.recipients().is_empty());
    }

    #[test]
    fn secret_reference_is_resolved_to_plaintext() {
        let mut relations = InMemoryRelationStore::new();
        let relation = relations.add_relation(MODERN_ENDPOINT);
        let mut bag = base_bag();
        bag.insert("password_id".to_string(), "secret:abc".to_string());
        relations.set_bag(relation, bag);

        let mut secrets = InMemorySecretStore::new();
        secrets.insert(
            SecretRef::new("secret:abc"),
            [("password".to_string(), "resolved".to_string())].into(),
        );
        let requirer = Requirer::new(relations, Some(secrets), MODERN_ENDPOINT);

        let event = requirer
            .relation_changed(relation)
            .expect("decode")
            .expect("event");
        assert_eq!(event.password(), Some("resolved"));
    }

    #[test]
    fn unresolvable_reference_is_a_loud_error() {
        let mut relations = InMemoryRelationStore::new();
        let relation = relations.add_relation(MODERN_ENDPOINT);
        let mut bag = base_bag();
        bag.insert("password_id".to_string(), "secret:gone".to_string());
        relations.set_bag(relation, bag);
        let requirer = Requirer::new(relations, Some(InMemorySecretStore::new()), MODERN_ENDPOINT);

        let err = requirer.relation_changed(relation).unwrap_err();
        assert!(matches!(err, RequirerError::SecretResolution { .. }));
    }

    #[test]
    fn reference_without_secret_store_is_a_loud_error() {
        let mut relations = InMemoryRelationStore::new();
        let relation = relations.add_relation(MODERN_ENDPOINT);
        let mut bag = base_bag();
        bag.insert("password_id".to_string(), "secret:abc".to_string());
        relations.set_bag(relation, bag);
        let requirer: TestRequirer = Requirer::new(relations, None, MODERN_ENDPOINT);

        let err = requirer.relation_changed(relation).unwrap_err();
        assert!(matches!(err, RequirerError::SecretsUnsupported { .. }));
    }

    #[test]
    fn secret_changed_re_emits_only_for_matching_relations() {
        let mut relations = InMemoryRelationStore::new();
        let matching = relations.add_relation(MODERN_ENDPOINT);
        let other = relations.add_relation(MODERN_ENDPOINT);
        let unrelated = relations.add_relation(MODERN_ENDPOINT);

        let mut bag = base_bag();
        // Stored with the owner-prefixed URI form; the notification uses the
        // bare scheme form.
        bag.insert(
            "password_id".to_string(),
            "secret://model-1/abc".to_string(),
        );
        relations.set_bag(matching, bag);

        let mut other_bag = base_bag();
        other_bag.insert("password_id".to_string(), "secret:different".to_string());
        relations.set_bag(other, other_bag);

        relations.set_bag(unrelated, base_bag());

        let mut secrets = InMemorySecretStore::new();
        secrets.insert(
            SecretRef::new("secret://model-1/abc"),
            [("password".to_string(), "rotated".to_string())].into(),
        );
        secrets.insert(
            SecretRef::new("secret:different"),
            [("password".to_string(), "other".to_string())].into(),
        );
        let requirer = Requirer::new(relations, Some(secrets), MODERN_ENDPOINT);

        let events = requirer
            .secret_changed(&SecretRef::new("secret:abc"))
            .expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].relation(), matching);
        assert_eq!(events[0].password(), Some("rotated"));
    }

    #[test]
    fn secret_changed_with_no_matches_is_silent() {
        let mut relations = InMemoryRelationStore::new();
        let relation = relations.add_relation(MODERN_ENDPOINT);
        relations.set_bag(relation, base_bag());
        let requirer: TestRequirer = Requirer::new(relations, None, MODERN_ENDPOINT);

        let events = requirer
            .secret_changed(&SecretRef::new("secret:abc"))
            .expect("events");
        assert!(events.is_empty());
    }
}
