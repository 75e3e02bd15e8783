//! Restriction matching for credential search and proof requests.

use crate::types::{CredentialInfo, Filter};
use credex_core::{issuer_of_cred_def, parse_schema_id};

/// True when every field set on `filter` matches the credential. Schema
/// name, version and issuer are read out of the schema id; the credential
/// issuer out of the definition id.
pub fn matches(filter: &Filter, info: &CredentialInfo) -> bool {
    if let Some(ref id) = filter.schema_id {
        if *id != info.schema_id {
            return false;
        }
    }
    if let Some(ref id) = filter.cred_def_id {
        if *id != info.cred_def_id {
            return false;
        }
    }

    let needs_schema_parts = filter.schema_issuer_did.is_some()
        || filter.schema_name.is_some()
        || filter.schema_version.is_some();
    if needs_schema_parts {
        let Ok(parts) = parse_schema_id(&info.schema_id) else {
            return false;
        };
        if filter.schema_issuer_did.as_ref().is_some_and(|d| *d != parts.issuer_did)
            || filter.schema_name.as_ref().is_some_and(|n| *n != parts.name)
            || filter.schema_version.as_ref().is_some_and(|v| *v != parts.version)
        {
            return false;
        }
    }

    if let Some(ref did) = filter.issuer_did {
        match issuer_of_cred_def(&info.cred_def_id) {
            Ok(issuer) if issuer == *did => {}
            _ => return false,
        }
    }
    true
}

/// A list of restrictions is a disjunction; an empty list matches anything.
pub fn matches_any(restrictions: &[Filter], info: &CredentialInfo) -> bool {
    restrictions.is_empty() || restrictions.iter().any(|f| matches(f, info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use credex_core::{
        build_cred_def_id, build_schema_id, CredDefId, CredentialId, IssuerDid, SchemaId,
    };
    use std::collections::BTreeMap;

    fn info(issuer: &str, schema_issuer: &str) -> CredentialInfo {
        let schema_id = build_schema_id(&IssuerDid::new(schema_issuer), "gvt", "1.0");
        let cred_def_id = build_cred_def_id(&IssuerDid::new(issuer), &schema_id, "TAG");
        CredentialInfo {
            referent: CredentialId::new("c1"),
            attrs: BTreeMap::new(),
            schema_id,
            cred_def_id,
            rev_reg_id: None,
            cred_rev_id: None,
        }
    }

    #[test]
    fn test_empty_filter_matches() {
        assert!(matches(&Filter::default(), &info("A", "S")));
        assert!(matches_any(&[], &info("A", "S")));
    }

    #[test]
    fn test_schema_parts() {
        let i = info("A", "S");
        let f = Filter {
            schema_name: Some("gvt".into()),
            schema_version: Some("1.0".into()),
            schema_issuer_did: Some(IssuerDid::new("S")),
            ..Default::default()
        };
        assert!(matches(&f, &i));
        let f = Filter {
            schema_version: Some("2.0".into()),
            ..Default::default()
        };
        assert!(!matches(&f, &i));
    }

    #[test]
    fn test_issuer_did_from_cred_def() {
        let i = info("A", "S");
        let ok = Filter {
            issuer_did: Some(IssuerDid::new("A")),
            ..Default::default()
        };
        let other = Filter {
            issuer_did: Some(IssuerDid::new("S")),
            ..Default::default()
        };
        assert!(matches(&ok, &i));
        assert!(!matches(&other, &i));
        assert!(matches_any(&[other, ok], &i));
    }

    #[test]
    fn test_exact_ids() {
        let i = info("A", "S");
        let f = Filter {
            cred_def_id: Some(CredDefId::new("nope")),
            ..Default::default()
        };
        assert!(!matches(&f, &i));
        let f = Filter {
            schema_id: Some(SchemaId::new("nope")),
            ..Default::default()
        };
        assert!(!matches(&f, &i));
    }
}
