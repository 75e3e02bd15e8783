//! Credential search for a proof request.
//!
//! For each referent, lists the stored credentials that could answer it. No
//! choice is made between candidates and no cryptography is involved.

use credex_core::attr_common_view;
use credex_cred::{matches_any, CredentialInfo, Holder, PredicateType};

use crate::error::ProofResult;
use crate::request::validate_proof_request;
use crate::types::{CredentialMatch, CredentialsForRequest, NonRevokedInterval, ProofRequest};

/// The credential attribute a requested name refers to, compared in common
/// view (lowercase, no whitespace).
pub(crate) fn resolve_attr_name<'a, I>(names: I, requested: &str) -> Option<&'a String>
where
    I: IntoIterator<Item = &'a String>,
{
    let wanted = attr_common_view(requested);
    names.into_iter().find(|name| attr_common_view(name) == wanted)
}

/// Predicates compare the raw value. Only values the attribute encoding
/// treats as integers qualify: an exact 32-bit decimal, no padding.
pub(crate) fn predicate_holds(raw: &str, p_type: PredicateType, threshold: i64) -> bool {
    raw.parse::<i32>()
        .map(|value| p_type.holds(i64::from(value), threshold))
        .unwrap_or(false)
}

/// Every stored credential that satisfies each referent of `request`.
pub fn find_credentials(holder: &Holder, request: &ProofRequest) -> ProofResult<CredentialsForRequest> {
    validate_proof_request(request)?;
    let stored = holder.credentials()?;
    tracing::debug!(
        nonce = %request.nonce,
        stored = stored.len(),
        attrs = request.requested_attributes.len(),
        predicates = request.requested_predicates.len(),
        "searching credentials for proof request"
    );

    let mut found = CredentialsForRequest::default();
    for (referent, info) in &request.requested_attributes {
        let restrictions = info.restrictions.as_deref().unwrap_or(&[]);
        let interval = request.attribute_interval(referent);
        let candidates = stored
            .iter()
            .filter(|c| matches_any(restrictions, c))
            .filter(|c| resolve_attr_name(c.attrs.keys(), &info.name).is_some())
            .map(|c| candidate(c, interval))
            .collect();
        found.attrs.insert(referent.clone(), candidates);
    }

    for (referent, info) in &request.requested_predicates {
        let restrictions = info.restrictions.as_deref().unwrap_or(&[]);
        let interval = request.predicate_interval(referent);
        let candidates = stored
            .iter()
            .filter(|c| matches_any(restrictions, c))
            .filter(|c| {
                resolve_attr_name(c.attrs.keys(), &info.name)
                    .and_then(|name| c.attrs.get(name))
                    .is_some_and(|raw| predicate_holds(raw, info.p_type, info.p_value))
            })
            .map(|c| candidate(c, interval))
            .collect();
        found.predicates.insert(referent.clone(), candidates);
    }
    Ok(found)
}

fn candidate(info: &CredentialInfo, interval: Option<NonRevokedInterval>) -> CredentialMatch {
    CredentialMatch {
        cred_info: info.clone(),
        // Only a revocable credential has anything to show for the interval.
        interval: interval.filter(|_| info.rev_reg_id.is_some()),
    }
}
