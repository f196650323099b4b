//! Wire codec for the relation data-bag format.
//!
//! Two encodings of the same bundle exist: the legacy form may embed the
//! plaintext password directly, while the modern form only ever carries a
//! reference to externally-stored secret content under `password_id`.
//!
//! Booleans are encoded as `true`/`false`. Peers from the original
//! ecosystem publish `True`/`False` instead, so the decoder accepts both.

use crate::store::DataBag;
use smtp_integrator_core::{ConfigError, RelayOptions, SmtpConfig};
use std::fmt;

/// Data-bag key names.
pub mod keys {
    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const USER: &str = "user";
    pub const PASSWORD: &str = "password";
    pub const PASSWORD_ID: &str = "password_id";
    pub const AUTH_TYPE: &str = "auth_type";
    pub const TRANSPORT_SECURITY: &str = "transport_security";
    pub const DOMAIN: &str = "domain";
    pub const SENDER: &str = "sender";
    pub const RECIPIENTS: &str = "recipients";
    pub const SKIP_TLS_VERIFY: &str = "skip_tls_verify";
}

/// Errors from decoding a relation data-bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A required key is absent (other than `host`, whose absence means
    /// "no data yet" rather than an error).
    MissingKey { key: &'static str },
    /// A key is present but its value does not parse.
    InvalidValue { key: &'static str, reason: String },
    /// The decoded fields fail bundle validation.
    Invalid(ConfigError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { key } => write!(f, "missing relation data key '{key}'"),
            Self::InvalidValue { key, reason } => {
                write!(f, "invalid relation data value for '{key}': {reason}")
            }
            Self::Invalid(err) => write!(f, "invalid relation data: {err}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<ConfigError> for DecodeError {
    fn from(err: ConfigError) -> Self {
        Self::Invalid(err)
    }
}

fn encode_common(config: &SmtpConfig) -> DataBag {
    let mut bag = DataBag::new();
    bag.insert(keys::HOST.to_string(), config.host().to_string());
    bag.insert(keys::PORT.to_string(), config.port().to_string());
    bag.insert(keys::AUTH_TYPE.to_string(), config.auth_type().to_string());
    bag.insert(
        keys::TRANSPORT_SECURITY.to_string(),
        config.transport_security().to_string(),
    );
    if let Some(user) = config.user() {
        bag.insert(keys::USER.to_string(), user.to_string());
    }
    if let Some(domain) = config.domain() {
        bag.insert(keys::DOMAIN.to_string(), domain.to_string());
    }
    if let Some(sender) = config.sender() {
        bag.insert(keys::SENDER.to_string(), sender.to_string());
    }
    if !config.recipients().is_empty() {
        // Recipients are always valid addresses, so serialization cannot fail.
        if let Ok(list) = serde_json::to_string(config.recipients()) {
            bag.insert(keys::RECIPIENTS.to_string(), list);
        }
    }
    if config.skip_tls_verify() {
        bag.insert(keys::SKIP_TLS_VERIFY.to_string(), "true".to_string());
    }
    bag
}

/// Encodes a bundle in the legacy form, embedding the plaintext password
/// when present. Never emits `password_id`.
#[must_use]
pub fn encode_legacy(config: &SmtpConfig) -> DataBag {
    let mut bag = encode_common(config);
    if let Some(password) = config.password() {
        bag.insert(keys::PASSWORD.to_string(), password.to_string());
    }
    bag
}

/// Encodes a bundle in the modern form, carrying the secret reference under
/// `password_id`. Never emits the plaintext password, even when the bundle
/// holds one in memory.
#[must_use]
pub fn encode_modern(config: &SmtpConfig) -> DataBag {
    let mut bag = encode_common(config);
    if let Some(reference) = config.password_ref() {
        bag.insert(keys::PASSWORD_ID.to_string(), reference.to_string());
    }
    bag
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, DecodeError> {
    match value {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        other => Err(DecodeError::InvalidValue {
            key,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

/// Decodes a relation data-bag into a validated bundle.
///
/// Returns `Ok(None)` when the bag has no `host` key: that is the normal
/// pre-integration state, not an error. All other required keys (`port`,
/// `auth_type`, `transport_security`) must be present and every value must
/// pass validation.
pub fn decode(bag: &DataBag) -> Result<Option<SmtpConfig>, DecodeError> {
    let Some(host) = bag.get(keys::HOST) else {
        return Ok(None);
    };

    let port_raw = bag
        .get(keys::PORT)
        .ok_or(DecodeError::MissingKey { key: keys::PORT })?;
    let port: u32 = port_raw.parse().map_err(|_| DecodeError::InvalidValue {
        key: keys::PORT,
        reason: format!("'{port_raw}' is not an integer"),
    })?;

    let auth_type = bag
        .get(keys::AUTH_TYPE)
        .ok_or(DecodeError::MissingKey { key: keys::AUTH_TYPE })?;
    let transport_security = bag.get(keys::TRANSPORT_SECURITY).ok_or(DecodeError::MissingKey {
        key: keys::TRANSPORT_SECURITY,
    })?;

    let skip_tls_verify = bag
        .get(keys::SKIP_TLS_VERIFY)
        .map(|value| parse_bool(keys::SKIP_TLS_VERIFY, value))
        .transpose()?;

    let options = RelayOptions {
        host: Some(host.clone()),
        port: Some(port),
        user: bag.get(keys::USER).cloned(),
        password: bag.get(keys::PASSWORD).cloned(),
        password_id: bag.get(keys::PASSWORD_ID).cloned(),
        auth_type: Some(auth_type.clone()),
        transport_security: Some(transport_security.clone()),
        domain: bag.get(keys::DOMAIN).cloned(),
        sender: bag.get(keys::SENDER).cloned(),
        recipients: bag.get(keys::RECIPIENTS).cloned(),
        skip_tls_verify,
    };

    Ok(Some(SmtpConfig::new(&options)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smtp_integrator_core::{AuthType, SecretRef, TransportSecurity};

    fn full_options() -> RelayOptions {
        RelayOptions {
            host: Some("smtp.example".to_string()),
            port: Some(587),
            user: Some("example_user".to_string()),
            auth_type: Some("plain".to_string()),
            transport_security: Some("starttls".to_string()),
            domain: Some("example.com".to_string()),
            sender: Some("noreply@example.com".to_string()),
            recipients: Some("a@x.com,b@y.com".to_string()),
            skip_tls_verify: Some(true),
            ..RelayOptions::default()
        }
    }

    #[test]
    fn legacy_encoding_matches_wire_format() {
        let options = RelayOptions {
            password: Some("somepassword".to_string()),
            ..full_options()
        };
        let config = SmtpConfig::new(&options).expect("config");
        let bag = encode_legacy(&config);

        assert_eq!(bag.get("host").map(String::as_str), Some("smtp.example"));
        assert_eq!(bag.get("port").map(String::as_str), Some("587"));
        assert_eq!(bag.get("user").map(String::as_str), Some("example_user"));
        assert_eq!(bag.get("password").map(String::as_str), Some("somepassword"));
        assert_eq!(bag.get("auth_type").map(String::as_str), Some("plain"));
        assert_eq!(
            bag.get("transport_security").map(String::as_str),
            Some("starttls")
        );
        assert_eq!(bag.get("domain").map(String::as_str), Some("example.com"));
        assert_eq!(
            bag.get("recipients").map(String::as_str),
            Some(r#"["a@x.com","b@y.com"]"#)
        );
        assert_eq!(bag.get("skip_tls_verify").map(String::as_str), Some("true"));
        assert!(!bag.contains_key("password_id"));
    }

    #[test]
    fn modern_encoding_never_carries_plaintext() {
        let config = SmtpConfig::new(&full_options())
            .expect("config")
            .with_password("resolved-in-memory")
            .with_password_ref(SecretRef::new("secret:abc"));
        let bag = encode_modern(&config);

        assert_eq!(bag.get("password_id").map(String::as_str), Some("secret:abc"));
        assert!(!bag.contains_key("password"));
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let options = RelayOptions {
            host: Some("smtp.example".to_string()),
            port: Some(25),
            ..RelayOptions::default()
        };
        let bag = encode_legacy(&SmtpConfig::new(&options).expect("config"));
        assert_eq!(
            bag.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["auth_type", "host", "port", "transport_security"]
        );
    }

    #[test]
    fn legacy_round_trip_without_password() {
        let config = SmtpConfig::new(&full_options()).expect("config");
        let decoded = decode(&encode_legacy(&config))
            .expect("decode")
            .expect("data present");
        assert_eq!(decoded, config);
    }

    #[test]
    fn padded_password_survives_legacy_round_trip() {
        let options = RelayOptions {
            password: Some("  somepassword  ".to_string()),
            ..full_options()
        };
        let config = SmtpConfig::new(&options).expect("config");
        let bag = encode_legacy(&config);
        assert_eq!(
            bag.get("password").map(String::as_str),
            Some("  somepassword  ")
        );
        let decoded = decode(&bag).expect("decode").expect("data present");
        assert_eq!(decoded.password(), Some("  somepassword  "));
    }

    #[test]
    fn modern_round_trip_preserves_reference() {
        let config = SmtpConfig::new(&full_options())
            .expect("config")
            .with_password_ref(SecretRef::new("secret:abc"));
        let decoded = decode(&encode_modern(&config))
            .expect("decode")
            .expect("data present");
        assert_eq!(decoded.password_ref(), Some(&SecretRef::new("secret:abc")));
        assert!(decoded.password().is_none());
        assert_eq!(decoded.host(), config.host());
        assert_eq!(decoded.recipients(), config.recipients());
    }

    #[test]
    fn missing_host_decodes_as_no_data() {
        let mut bag = DataBag::new();
        bag.insert("port".to_string(), "25".to_string());
        assert_eq!(decode(&bag).expect("decode"), None);
    }

    #[test]
    fn empty_bag_decodes_as_no_data() {
        assert_eq!(decode(&DataBag::new()).expect("decode"), None);
    }

    #[test]
    fn missing_port_is_an_error() {
        let mut bag = DataBag::new();
        bag.insert("host".to_string(), "smtp.example".to_string());
        assert_eq!(
            decode(&bag).unwrap_err(),
            DecodeError::MissingKey { key: "port" }
        );
    }

    #[test]
    fn unparsable_port_is_an_error() {
        let mut bag = DataBag::new();
        bag.insert("host".to_string(), "smtp.example".to_string());
        bag.insert("port".to_string(), "lots".to_string());
        bag.insert("auth_type".to_string(), "none".to_string());
        bag.insert("transport_security".to_string(), "none".to_string());
        assert!(matches!(
            decode(&bag).unwrap_err(),
            DecodeError::InvalidValue { key: "port", .. }
        ));
    }

    #[test]
    fn skip_tls_verify_defaults_false_and_accepts_python_literals() {
        let mut bag = DataBag::new();
        bag.insert("host".to_string(), "smtp.example".to_string());
        bag.insert("port".to_string(), "25".to_string());
        bag.insert("auth_type".to_string(), "none".to_string());
        bag.insert("transport_security".to_string(), "none".to_string());

        let decoded = decode(&bag).expect("decode").expect("data");
        assert!(!decoded.skip_tls_verify());

        bag.insert("skip_tls_verify".to_string(), "True".to_string());
        let decoded = decode(&bag).expect("decode").expect("data");
        assert!(decoded.skip_tls_verify());

        bag.insert("skip_tls_verify".to_string(), "maybe".to_string());
        assert!(decode(&bag).is_err());
    }

    #[test]
    fn invalid_enum_value_is_an_error() {
        let mut bag = DataBag::new();
        bag.insert("host".to_string(), "smtp.example".to_string());
        bag.insert("port".to_string(), "25".to_string());
        bag.insert("auth_type".to_string(), "kerberos".to_string());
        bag.insert("transport_security".to_string(), "none".to_string());
        assert!(matches!(decode(&bag).unwrap_err(), DecodeError::Invalid(_)));
    }

    #[test]
    fn repeated_encoding_is_byte_identical() {
        let config = SmtpConfig::new(&full_options()).expect("config");
        assert_eq!(encode_legacy(&config), encode_legacy(&config));
        assert_eq!(encode_modern(&config), encode_modern(&config));
    }
}
