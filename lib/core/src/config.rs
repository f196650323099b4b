//! The validated SMTP configuration bundle.
//!
//! `SmtpConfig` is the record shared across the relation protocol. It can
//! only be obtained through [`SmtpConfig::new`], which is the sole
//! validation gate: no partially-valid instance exists anywhere in the
//! system.

use crate::address::{is_valid_email, parse_recipients};
use crate::error::ConfigError;
use crate::secret::SecretRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The authentication mechanism to use against the SMTP relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// No authentication.
    #[default]
    None,
    /// Authentication deliberately left unspecified by the operator.
    NotProvided,
    /// SMTP AUTH PLAIN.
    Plain,
}

impl AuthType {
    /// The canonical wire token for this value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::NotProvided => "not_provided",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "not_provided" => Ok(Self::NotProvided),
            "plain" => Ok(Self::Plain),
            other => Err(ConfigError::InvalidField {
                field: "auth_type",
                reason: format!("unknown value '{other}'"),
            }),
        }
    }
}

/// The transport security protocol for the relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportSecurity {
    /// Plaintext connection.
    #[default]
    None,
    /// Opportunistic TLS upgrade.
    Starttls,
    /// Implicit TLS.
    Tls,
}

impl TransportSecurity {
    /// The canonical wire token for this value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Starttls => "starttls",
            Self::Tls => "tls",
        }
    }
}

impl fmt::Display for TransportSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransportSecurity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "starttls" => Ok(Self::Starttls),
            "tls" => Ok(Self::Tls),
            other => Err(ConfigError::InvalidField {
                field: "transport_security",
                reason: format!("unknown value '{other}'"),
            }),
        }
    }
}

/// The raw, unvalidated option record supplied by the operator.
///
/// This mirrors the configuration surface field for field. How the values
/// are loaded (config files, environment, a schema layer) is the embedder's
/// concern; this crate only validates the record.
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
    /// Hostname or IP address of the outgoing SMTP relay.
    pub host: Option<String>,
    /// Port of the outgoing SMTP relay.
    pub port: Option<u32>,
    /// SMTP AUTH user.
    pub user: Option<String>,
    /// SMTP AUTH password, as plaintext.
    pub password: Option<String>,
    /// Reference to a secret already holding the password, as an alternative
    /// to `password`.
    pub password_id: Option<String>,
    /// Authentication mechanism token.
    pub auth_type: Option<String>,
    /// Transport security token.
    pub transport_security: Option<String>,
    /// Domain used in the MAIL FROM envelope.
    pub domain: Option<String>,
    /// Address to use as the sender.
    pub sender: Option<String>,
    /// Recipients allowed to be sent to, in any of the accepted encodings.
    pub recipients: Option<String>,
    /// Whether to skip TLS certificate verification.
    pub skip_tls_verify: Option<bool>,
}

/// The validated SMTP configuration bundle.
///
/// Fields are private; construction through [`SmtpConfig::new`] is the only
/// way to obtain an instance, so every instance in circulation satisfies the
/// protocol invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmtpConfig {
    host: String,
    port: u32,
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password_ref: Option<SecretRef>,
    auth_type: AuthType,
    transport_security: TransportSecurity,
    domain: Option<String>,
    sender: Option<String>,
    recipients: Vec<String>,
    skip_tls_verify: bool,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

impl SmtpConfig {
    /// Validates an option record into a configuration bundle.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first field that fails
    /// validation. No partially-valid bundle is ever produced.
    pub fn new(options: &RelayOptions) -> Result<Self, ConfigError> {
        let host =
            non_empty(options.host.as_deref()).ok_or(ConfigError::MissingField { field: "host" })?;

        let port = options.port.ok_or(ConfigError::MissingField { field: "port" })?;
        if !(1..=65536).contains(&port) {
            return Err(ConfigError::InvalidField {
                field: "port",
                reason: format!("{port} is outside 1-65536"),
            });
        }

        let auth_type = match non_empty(options.auth_type.as_deref()) {
            Some(token) => token.parse()?,
            None => AuthType::default(),
        };
        let transport_security = match non_empty(options.transport_security.as_deref()) {
            Some(token) => token.parse()?,
            None => TransportSecurity::default(),
        };

        let sender = non_empty(options.sender.as_deref());
        if let Some(sender) = &sender {
            if !is_valid_email(sender) {
                return Err(ConfigError::InvalidField {
                    field: "sender",
                    reason: format!("'{sender}' is not a valid email address"),
                });
            }
        }

        let recipients = parse_recipients(options.recipients.as_deref())?;

        // Credential material passes through verbatim; only the empty
        // string normalizes to None, never trimming.
        let password = options
            .password
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned);
        let password_ref = non_empty(options.password_id.as_deref()).map(SecretRef::new);
        if password.is_some() && password_ref.is_some() {
            return Err(ConfigError::ConflictingFields {
                first: "password",
                second: "password_id",
            });
        }

        Ok(Self {
            host,
            port,
            user: non_empty(options.user.as_deref()),
            password,
            password_ref,
            auth_type,
            transport_security,
            domain: non_empty(options.domain.as_deref()),
            sender,
            recipients,
            skip_tls_verify: options.skip_tls_verify.unwrap_or(false),
        })
    }

    /// Returns a copy of this bundle carrying the given plaintext password.
    ///
    /// Used when a secret reference has been resolved to its content; the
    /// password value itself needs no validation.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Returns a copy of this bundle carrying the given secret reference.
    #[must_use]
    pub fn with_password_ref(mut self, reference: SecretRef) -> Self {
        self.password_ref = Some(reference);
        self
    }

    /// Hostname or IP address of the relay.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Relay port.
    #[must_use]
    pub fn port(&self) -> u32 {
        self.port
    }

    /// SMTP AUTH user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Plaintext password, if present in this bundle.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Reference to externally-stored password content, if any.
    #[must_use]
    pub fn password_ref(&self) -> Option<&SecretRef> {
        self.password_ref.as_ref()
    }

    /// Authentication mechanism.
    #[must_use]
    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    /// Transport security protocol.
    #[must_use]
    pub fn transport_security(&self) -> TransportSecurity {
        self.transport_security
    }

    /// Envelope domain, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Sender address, if any.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Validated recipient addresses; empty when none were configured.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Whether TLS certificate verification is skipped.
    #[must_use]
    pub fn skip_tls_verify(&self) -> bool {
        self.skip_tls_verify
    }
}
