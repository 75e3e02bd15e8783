//! Schema validation.
//!
//! Structural checks run before any key generation or ledger call. Name and
//! version must be non-blank and free of ':', the identifier separator; any
//! other text is accepted. A schema also needs at least one attribute, no
//! duplicate attribute names (compared in their canonical form) and no more
//! than the attribute count limit.

use crate::error::{CredError, CredErrorDetail, CredResult};
use credex_core::attr_common_view;
use std::collections::HashSet;

pub const DEFAULT_MAX_ATTRIBUTES: usize = 125;

/// Usable as one segment of a ledger identifier.
fn is_ledger_safe(s: &str) -> bool {
    !s.trim().is_empty() && !s.contains(':')
}

/// Validate schema fields without building a schema.
/// Returns a list of validation error messages (empty list means valid).
pub fn validate_schema(
    name: &str,
    version: &str,
    attr_names: &[String],
    max_attributes: usize,
) -> Vec<String> {
    let mut errors = Vec::new();

    if !is_ledger_safe(name) {
        errors.push(format!("Schema name '{}' must be non-blank and without ':'", name));
    }
    if !is_ledger_safe(version) {
        errors.push(format!("Schema version '{}' must be non-blank and without ':'", version));
    }

    if attr_names.is_empty() {
        errors.push("Schema must have at least one attribute".to_string());
    }

    let mut seen = HashSet::new();
    for attr in attr_names {
        if attr.trim().is_empty() {
            errors.push("Attribute names must not be blank".to_string());
            continue;
        }
        if !seen.insert(attr_common_view(attr)) {
            errors.push(format!("Duplicate attribute name: '{}'", attr));
        }
    }

    if attr_names.len() > max_attributes {
        errors.push(format!(
            "Schema has {} attributes, exceeding max of {}",
            attr_names.len(),
            max_attributes
        ));
    }

    errors
}

/// Validate and return the first problem as an `InvalidSchema` error.
pub fn validate_schema_strict(
    name: &str,
    version: &str,
    attr_names: &[String],
    max_attributes: usize,
) -> CredResult<()> {
    let errors = validate_schema(name, version, attr_names, max_attributes);
    match errors.into_iter().next() {
        None => Ok(()),
        Some(first) => Err(CredErrorDetail::new(
            CredError::InvalidSchema(first.clone()),
            first,
        )),
    }
}

/// Credential definition and registry tags share the ledger-safe rule.
pub fn validate_tag(tag: &str) -> CredResult<()> {
    if is_ledger_safe(tag) {
        Ok(())
    } else {
        Err(CredErrorDetail::new(
            CredError::InvalidSchema(format!("invalid tag '{}'", tag)),
            "tags must be non-blank and without ':'",
        ))
    }
}
