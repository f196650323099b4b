//! Email address validation and recipients parsing.
//!
//! Recipients arrive from the configuration surface in one of three textual
//! encodings; all of them normalize to the same ordered list of validated
//! addresses.

use crate::error::ConfigError;

/// Checks whether a string is a syntactically valid email address.
///
/// This is the envelope-level check used across the protocol: a non-empty
/// local part, a single `@`, and a dotted domain with no surrounding dots or
/// embedded whitespace. Full RFC 5322 parsing is deliberately out of scope.
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
        && !address.chars().any(char::is_whitespace)
}

/// Parses a recipients string into an ordered list of validated addresses.
///
/// Accepted encodings, tried in this fixed order:
///
/// 1. absent or whitespace-only input parses as the empty list;
/// 2. input starting with `[` must parse as a JSON array of strings;
/// 3. anything else splits on commas, with whitespace and then surrounding
///    double quotes trimmed from each entry (this also covers the
///    bracket-less list of quoted strings, including a single quoted entry).
///
/// Any entry that fails address validation fails the whole parse.
pub fn parse_recipients(input: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = input else {
        return Ok(Vec::new());
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidField {
            field: "recipients",
            reason: format!("not a JSON list of strings: {e}"),
        })?
    } else {
        raw.split(',')
            .map(|entry| entry.trim().trim_matches('"').trim().to_string())
            .collect()
    };

    for entry in &entries {
        if !is_valid_email(entry) {
            return Err(ConfigError::InvalidField {
                field: "recipients",
                reason: format!("'{entry}' is not a valid email address"),
            });
        }
    }
    Ok(entries)
}
