//! Proof verification.
//!
//! The verifier resolves every object a proof names from its own reads and
//! checks each against the proof's identifiers before anything reaches the
//! proof engine. Any problem with the proof yields `Ok(false)` with a
//! `warn!` naming the reason; only a malformed request is an error.

use std::collections::BTreeMap;

use credex_core::{verify_encoding, CredentialId, Timestamp};
use credex_cred::{
    matches_any, CredentialDefinition, CredentialInfo, Filter, PredicateSpec, ProofEngine,
    RevocationRegistry, Schema, SubProofRequest, VerifyingItem,
};

use crate::error::ProofResult;
use crate::plan::resolve_attr_name;
use crate::request::validate_proof_request;
use crate::types::{Identifier, NonRevokedInterval, Proof, ProofRequest, VerifierObjects};

/// Why a proof was rejected.
type Rejection = String;

/// One identifier of the proof, resolved against the verifier's objects.
struct Resolved<'a> {
    schema: &'a Schema,
    cred_def: &'a CredentialDefinition,
    registry: Option<&'a RevocationRegistry>,
    timestamp: Option<Timestamp>,
    info: CredentialInfo,
    request: SubProofRequest,
    revealed: BTreeMap<String, String>,
}

fn resolve<'a>(
    objects: &'a VerifierObjects,
    position: usize,
    identifier: &Identifier,
) -> Result<Resolved<'a>, Rejection> {
    let schema = objects
        .schemas
        .get(&identifier.schema_id)
        .filter(|s| s.id == identifier.schema_id)
        .ok_or_else(|| format!("identifier {}: schema {} not resolved", position, identifier.schema_id))?;
    let cred_def = objects
        .cred_defs
        .get(&identifier.cred_def_id)
        .filter(|d| d.id == identifier.cred_def_id)
        .ok_or_else(|| {
            format!(
                "identifier {}: credential definition {} not resolved",
                position, identifier.cred_def_id
            )
        })?;
    if cred_def.schema_id != schema.id {
        return Err(format!(
            "identifier {}: {} is not defined over {}",
            position, cred_def.id, schema.id
        ));
    }

    let registry = match (&identifier.rev_reg_id, identifier.timestamp) {
        (None, None) => None,
        (Some(rev_reg_id), Some(timestamp)) => {
            let def = objects
                .rev_reg_defs
                .get(rev_reg_id)
                .filter(|d| d.id == *rev_reg_id)
                .ok_or_else(|| format!("identifier {}: registry {} not resolved", position, rev_reg_id))?;
            if def.cred_def_id != cred_def.id {
                return Err(format!(
                    "identifier {}: registry {} belongs to {}",
                    position, rev_reg_id, def.cred_def_id
                ));
            }
            let registry = objects
                .registry_at(rev_reg_id, timestamp)
                .filter(|r| r.registry_id == *rev_reg_id)
                .ok_or_else(|| {
                    format!(
                        "identifier {}: no state of {} at {}",
                        position, rev_reg_id, timestamp
                    )
                })?;
            Some(registry)
        }
        _ => {
            return Err(format!(
                "identifier {}: registry id and timestamp must come together",
                position
            ))
        }
    };

    Ok(Resolved {
        schema,
        cred_def,
        registry,
        timestamp: identifier.timestamp,
        info: CredentialInfo {
            referent: CredentialId::new(format!("sub-proof-{}", position)),
            attrs: BTreeMap::new(),
            schema_id: identifier.schema_id.clone(),
            cred_def_id: identifier.cred_def_id.clone(),
            rev_reg_id: identifier.rev_reg_id.clone(),
            cred_rev_id: None,
        },
        request: SubProofRequest::default(),
        revealed: BTreeMap::new(),
    })
}

/// Checks shared by every credential-backed referent. Returns the schema's
/// name for the requested attribute.
fn check_referent(
    referent: &str,
    name: &str,
    restrictions: Option<&[Filter]>,
    interval: Option<NonRevokedInterval>,
    sub: &Resolved<'_>,
) -> Result<String, Rejection> {
    let attr_name = resolve_attr_name(&sub.schema.attr_names, name)
        .ok_or_else(|| format!("{}: schema {} has no attribute {}", referent, sub.schema.id, name))?;
    if !matches_any(restrictions.unwrap_or(&[]), &sub.info) {
        return Err(format!(
            "{}: {} does not satisfy the restrictions",
            referent, sub.cred_def.id
        ));
    }
    if let Some(interval) = interval.filter(|_| sub.cred_def.supports_revocation) {
        match sub.timestamp {
            None => return Err(format!("{}: no non-revocation proof", referent)),
            Some(timestamp) if !interval.is_covered_by(timestamp) => {
                return Err(format!(
                    "{}: registry state at {} is older than the requested interval",
                    referent, timestamp
                ))
            }
            Some(_) => {}
        }
    }
    Ok(attr_name.clone())
}

fn sub_proof<'r, 'a>(
    resolved: &'r mut [Resolved<'a>],
    referent: &str,
    index: u32,
) -> Result<&'r mut Resolved<'a>, Rejection> {
    resolved
        .get_mut(index as usize)
        .ok_or_else(|| format!("{}: sub-proof index {} out of range", referent, index))
}

/// Everything up to the engine call. Returns the engine's inputs.
fn check<'a>(
    request: &ProofRequest,
    proof: &Proof,
    objects: &'a VerifierObjects,
) -> Result<Vec<Resolved<'a>>, Rejection> {
    let requested = &proof.requested_proof;
    let mut resolved = proof
        .identifiers
        .iter()
        .enumerate()
        .map(|(position, identifier)| resolve(objects, position, identifier))
        .collect::<Result<Vec<_>, _>>()?;

    for referent in requested
        .revealed_attrs
        .keys()
        .chain(requested.unrevealed_attrs.keys())
        .chain(requested.self_attested_attrs.keys())
    {
        if !request.requested_attributes.contains_key(referent) {
            return Err(format!("{} was not requested", referent));
        }
    }
    for referent in requested.predicates.keys() {
        if !request.requested_predicates.contains_key(referent) {
            return Err(format!("{} was not requested", referent));
        }
    }

    for (referent, info) in &request.requested_attributes {
        let answers = [
            requested.revealed_attrs.contains_key(referent),
            requested.unrevealed_attrs.contains_key(referent),
            requested.self_attested_attrs.contains_key(referent),
        ];
        match answers.iter().filter(|a| **a).count() {
            0 => return Err(format!("{} is not answered", referent)),
            1 => {}
            _ => return Err(format!("{} is answered more than once", referent)),
        }

        if requested.self_attested_attrs.contains_key(referent) {
            if info.is_restricted() {
                return Err(format!("{} is restricted but self-attested", referent));
            }
            continue;
        }

        let interval = request.attribute_interval(referent);
        let restrictions = info.restrictions.as_deref();
        if let Some(revealed) = requested.revealed_attrs.get(referent) {
            let sub = sub_proof(&mut resolved, referent, revealed.sub_proof_index)?;
            let attr_name = check_referent(referent, &info.name, restrictions, interval, sub)?;
            if !verify_encoding(&revealed.raw, &revealed.encoded) {
                return Err(format!("{}: revealed value does not match its encoding", referent));
            }
            if let Some(previous) = sub.revealed.get(&attr_name) {
                if *previous != revealed.encoded {
                    return Err(format!("{}: {} revealed with two values", referent, attr_name));
                }
            }
            sub.request.revealed_attrs.insert(attr_name.clone());
            sub.revealed.insert(attr_name, revealed.encoded.clone());
        } else if let Some(unrevealed) = requested.unrevealed_attrs.get(referent) {
            let sub = sub_proof(&mut resolved, referent, unrevealed.sub_proof_index)?;
            check_referent(referent, &info.name, restrictions, interval, sub)?;
        }
    }

    for (referent, info) in &request.requested_predicates {
        let answer = requested
            .predicates
            .get(referent)
            .ok_or_else(|| format!("{} is not answered", referent))?;
        let sub = sub_proof(&mut resolved, referent, answer.sub_proof_index)?;
        let attr_name = check_referent(
            referent,
            &info.name,
            info.restrictions.as_deref(),
            request.predicate_interval(referent),
            sub,
        )?;
        sub.request.predicates.push(PredicateSpec {
            attr_name,
            p_type: info.p_type,
            value: info.p_value,
        });
    }
    Ok(resolved)
}

/// Check `proof` against `request` using only objects the verifier resolved
/// itself.
pub fn verify(
    engine: &dyn ProofEngine,
    request: &ProofRequest,
    proof: &Proof,
    objects: &VerifierObjects,
) -> ProofResult<bool> {
    validate_proof_request(request)?;
    tracing::debug!(
        nonce = %request.nonce,
        identifiers = proof.identifiers.len(),
        "verifying proof"
    );

    let resolved = match check(request, proof, objects) {
        Ok(resolved) => resolved,
        Err(reason) => {
            tracing::warn!(nonce = %request.nonce, %reason, "proof rejected");
            return Ok(false);
        }
    };

    let items: Vec<VerifyingItem<'_>> = resolved
        .into_iter()
        .map(|sub| VerifyingItem {
            cred_def: sub.cred_def,
            registry: sub.registry,
            request: sub.request,
            revealed: sub.revealed,
        })
        .collect();

    match engine.verify_proof(&request.nonce, &items, &proof.proof) {
        Ok(true) => {
            tracing::info!(nonce = %request.nonce, sub_proofs = items.len(), "proof verified");
            Ok(true)
        }
        Ok(false) => {
            tracing::warn!(nonce = %request.nonce, "proof rejected: engine check failed");
            Ok(false)
        }
        Err(err) => {
            tracing::warn!(nonce = %request.nonce, error = %err, "proof rejected: engine error");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeInfo, RequestedProof, RevealedAttributeInfo};
    use credex_core::{encode_attribute, CredDefId, IssuerDid, Nonce, RevRegId, SchemaId};
    use credex_cred::{CredentialPublicKey, ProofMaterial, SimulatedProofEngine};

    const SCHEMA: &str = "did:2:gvt:1.0";
    const CRED_DEF: &str = "did:3:CL:did:2:gvt:1.0:TAG";
    const REGISTRY: &str = "did:4:did:3:CL:did:2:gvt:1.0:TAG:CL_ACCUM:R1";

    fn objects() -> VerifierObjects {
        let mut objects = VerifierObjects::default();
        objects.schemas.insert(
            SchemaId::new(SCHEMA),
            Schema {
                id: SchemaId::new(SCHEMA),
                issuer_did: IssuerDid::new("did"),
                name: "gvt".into(),
                version: "1.0".into(),
                attr_names: ["name".to_string(), "age".to_string()].into_iter().collect(),
            },
        );
        objects.cred_defs.insert(
            CredDefId::new(CRED_DEF),
            CredentialDefinition {
                id: CredDefId::new(CRED_DEF),
                schema_id: SchemaId::new(SCHEMA),
                issuer_did: IssuerDid::new("did"),
                tag: "TAG".into(),
                signature_type: "CL".into(),
                supports_revocation: true,
                public_key: CredentialPublicKey::from_bytes(vec![0; 32]),
            },
        );
        objects
    }

    fn request(interval: Option<NonRevokedInterval>) -> ProofRequest {
        ProofRequest {
            nonce: Nonce("7".into()),
            name: "p".into(),
            version: "1.0".into(),
            requested_attributes: BTreeMap::from([("attr1".to_string(), AttributeInfo::new("Name"))]),
            requested_predicates: BTreeMap::new(),
            non_revoked: interval,
        }
    }

    fn proof(identifier: Identifier, raw: &str, encoded: String) -> Proof {
        let mut requested_proof = RequestedProof::default();
        requested_proof.revealed_attrs.insert(
            "attr1".into(),
            RevealedAttributeInfo {
                sub_proof_index: 0,
                raw: raw.into(),
                encoded,
            },
        );
        Proof {
            proof: ProofMaterial::from_bytes(b"{}".to_vec()),
            requested_proof,
            identifiers: vec![identifier],
        }
    }

    fn identifier(timestamp: Option<Timestamp>) -> Identifier {
        Identifier {
            schema_id: SchemaId::new(SCHEMA),
            cred_def_id: CredDefId::new(CRED_DEF),
            rev_reg_id: timestamp.map(|_| RevRegId::new(REGISTRY)),
            timestamp,
        }
    }

    #[test]
    fn test_malformed_request_is_an_error() {
        let mut req = request(None);
        req.requested_attributes.clear();
        let p = proof(identifier(None), "Alex", encode_attribute("Alex"));
        assert!(verify(&SimulatedProofEngine, &req, &p, &objects()).is_err());
    }

    #[test]
    fn test_structural_checks_pass_before_engine() {
        let p = proof(identifier(None), "Alex", encode_attribute("Alex"));
        let objects = objects();
        let resolved = check(&request(None), &p, &objects).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].request.revealed_attrs.contains("name"));
        // Garbage proof material fails in the engine, closed.
        assert!(!verify(&SimulatedProofEngine, &request(None), &p, &objects).unwrap());
    }

    #[test]
    fn test_tampered_raw_value_rejected() {
        let p = proof(identifier(None), "Mallory", encode_attribute("Alex"));
        assert!(check(&request(None), &p, &objects()).is_err());
    }

    #[test]
    fn test_unresolved_objects_rejected() {
        let p = proof(identifier(None), "Alex", encode_attribute("Alex"));
        let mut objects = objects();
        objects.schemas.clear();
        assert!(check(&request(None), &p, &objects).is_err());
    }

    #[test]
    fn test_mismatched_object_under_id_rejected() {
        let p = proof(identifier(None), "Alex", encode_attribute("Alex"));
        let mut objects = objects();
        let mut other = objects.cred_defs[&CredDefId::new(CRED_DEF)].clone();
        other.id = CredDefId::new("elsewhere");
        objects.cred_defs.insert(CredDefId::new(CRED_DEF), other);
        assert!(check(&request(None), &p, &objects).is_err());
    }

    #[test]
    fn test_interval_needs_non_revocation_proof() {
        let req = request(Some(NonRevokedInterval::to(Timestamp(50))));
        let p = proof(identifier(None), "Alex", encode_attribute("Alex"));
        assert!(check(&req, &p, &objects()).is_err());
    }

    #[test]
    fn test_stale_registry_state_rejected() {
        let req = request(Some(NonRevokedInterval::to(Timestamp(50))));
        let mut objects = objects();
        let def: credex_cred::RevocationRegistryDefinition = serde_json::from_value(serde_json::json!({
            "id": REGISTRY,
            "cred_def_id": CRED_DEF,
            "issuer_did": "did",
            "tag": "R1",
            "max_credential_count": 5,
            "issuance_mode": "ISSUANCE_ON_DEMAND",
            "public_keys": "",
            "tails_location": "tails/x",
            "tails_hash": "x"
        }))
        .unwrap();
        objects.rev_reg_defs.insert(def.id.clone(), def);
        for t in [40, 60] {
            objects.rev_regs.entry(RevRegId::new(REGISTRY)).or_default().insert(
                Timestamp(t),
                RevocationRegistry {
                    registry_id: RevRegId::new(REGISTRY),
                    accumulator: credex_cred::Accumulator::from_bytes(vec![0; 32]),
                    as_of: Timestamp(t),
                },
            );
        }

        let stale = proof(identifier(Some(Timestamp(40))), "Alex", encode_attribute("Alex"));
        assert!(check(&req, &stale, &objects).is_err());
        let fresh = proof(identifier(Some(Timestamp(60))), "Alex", encode_attribute("Alex"));
        let resolved = check(&req, &fresh, &objects).unwrap();
        assert!(resolved[0].registry.is_some());
    }

    #[test]
    fn test_unanswered_and_out_of_range_referents() {
        let mut p = proof(identifier(None), "Alex", encode_attribute("Alex"));
        p.requested_proof.revealed_attrs.clear();
        assert!(check(&request(None), &p, &objects()).is_err());

        let mut p = proof(identifier(None), "Alex", encode_attribute("Alex"));
        p.requested_proof
            .revealed_attrs
            .get_mut("attr1")
            .unwrap()
            .sub_proof_index = 3;
        assert!(check(&request(None), &p, &objects()).is_err());
    }

    #[test]
    fn test_self_attested_only_without_restrictions() {
        let mut p = proof(identifier(None), "Alex", encode_attribute("Alex"));
        p.requested_proof.revealed_attrs.clear();
        p.requested_proof.self_attested_attrs.insert("attr1".into(), "Alex".into());
        assert!(check(&request(None), &p, &objects()).is_ok());

        let mut req = request(None);
        req.requested_attributes.insert(
            "attr1".into(),
            AttributeInfo::new("name").restrict(Filter {
                schema_name: Some("gvt".into()),
                ..Default::default()
            }),
        );
        assert!(check(&req, &p, &objects()).is_err());
    }
}
