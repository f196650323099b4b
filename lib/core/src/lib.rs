//! Core domain types for the SMTP relay integrator.
//!
//! This crate provides the validated SMTP configuration bundle shared across
//! the relation protocol, along with email-address parsing and the opaque
//! secret-reference type used by the modern protocol variant.

pub mod address;
pub mod config;
pub mod error;
pub mod secret;

pub use address::{is_valid_email, parse_recipients};
pub use config::{AuthType, RelayOptions, SmtpConfig, TransportSecurity};
pub use error::ConfigError;
pub use secret::SecretRef;
