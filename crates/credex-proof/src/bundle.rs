//! Presentation: turn a proof request and the prover's selection into a proof.
//!
//! Everything the proof engine is handed has been checked here first:
//! restrictions, attribute names, encodings, predicate values and the
//! revocation state each non-revoked interval needs. Selected credentials
//! that share a revocation timestamp share one sub-proof.

use std::collections::BTreeMap;

use credex_core::{verify_encoding, CredentialId, Timestamp};
use credex_cred::{
    matches_any, Credential, CredentialInfo, Filter, MasterSecret, PredicateSpec, ProofEngine,
    ProvingItem, RevocationState, SubProofRequest,
};

use crate::error::{ProofError, ProofResult};
use crate::plan::{predicate_holds, resolve_attr_name};
use crate::request::validate_proof_request;
use crate::types::{
    Identifier, NonRevokedInterval, Proof, ProofRequest, ProverObjects, RequestedCredentials,
    RequestedProof, RevealedAttributeInfo, SubProofReferent,
};

/// One sub-proof under construction.
struct SubProof<'a> {
    credential: &'a Credential,
    rev_state: Option<&'a RevocationState>,
    timestamp: Option<Timestamp>,
    request: SubProofRequest,
}

#[derive(Default)]
struct SubProofs<'a> {
    items: Vec<SubProof<'a>>,
    by_key: BTreeMap<(CredentialId, Option<Timestamp>), u32>,
}

impl<'a> SubProofs<'a> {
    /// Index of the sub-proof for this credential at this timestamp.
    fn slot(
        &mut self,
        cred_id: &CredentialId,
        credential: &'a Credential,
        rev_state: Option<&'a RevocationState>,
        timestamp: Option<Timestamp>,
    ) -> u32 {
        let key = (cred_id.clone(), timestamp);
        if let Some(index) = self.by_key.get(&key) {
            return *index;
        }
        let index = self.items.len() as u32;
        self.items.push(SubProof {
            credential,
            rev_state,
            timestamp,
            request: SubProofRequest::default(),
        });
        self.by_key.insert(key, index);
        index
    }
}

fn credential_info(cred_id: &CredentialId, credential: &Credential) -> CredentialInfo {
    CredentialInfo {
        referent: cred_id.clone(),
        attrs: credential
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.raw.clone()))
            .collect(),
        schema_id: credential.schema_id.clone(),
        cred_def_id: credential.cred_def_id.clone(),
        rev_reg_id: credential.rev_reg_id.clone(),
        cred_rev_id: credential.rev_reg_index,
    }
}

fn lookup_credential<'a>(
    objects: &'a ProverObjects,
    referent: &str,
    cred_id: &CredentialId,
) -> ProofResult<&'a Credential> {
    objects.credentials.get(cred_id).ok_or_else(|| {
        ProofError::CredentialNotFound(format!("{} selected for {}", cred_id, referent))
    })
}

/// The revocation state a referent needs, if its interval applies to this
/// credential. Returns the timestamp the sub-proof is made at.
fn non_revocation<'a>(
    objects: &'a ProverObjects,
    referent: &str,
    credential: &Credential,
    interval: Option<NonRevokedInterval>,
    timestamp: Option<Timestamp>,
) -> ProofResult<(Option<&'a RevocationState>, Option<Timestamp>)> {
    let (Some(_), Some(registry_id), Some(index)) =
        (interval, &credential.rev_reg_id, credential.rev_reg_index)
    else {
        return Ok((None, None));
    };
    let timestamp = timestamp.ok_or_else(|| {
        ProofError::MissingNonRevocationState(format!("{}: no timestamp selected", referent))
    })?;
    let state = objects.rev_state(registry_id, index, timestamp).ok_or_else(|| {
        ProofError::MissingNonRevocationState(format!(
            "{}: no state for {} index {} at {}",
            referent, registry_id, index, timestamp
        ))
    })?;
    if state.is_revoked() {
        tracing::warn!(%registry_id, index, %timestamp, "presenting a revoked credential");
    }
    Ok((Some(state), Some(timestamp)))
}

fn check_restrictions(
    referent: &str,
    restrictions: Option<&[Filter]>,
    cred_id: &CredentialId,
    credential: &Credential,
) -> ProofResult<()> {
    let restrictions = restrictions.unwrap_or(&[]);
    if matches_any(restrictions, &credential_info(cred_id, credential)) {
        Ok(())
    } else {
        Err(ProofError::CredentialRequestMismatch(format!(
            "{}: credential {} from {} does not satisfy the restrictions",
            referent, cred_id, credential.cred_def_id
        )))
    }
}

/// Build a proof answering `request` with the prover's `selection`.
pub fn create_proof(
    engine: &dyn ProofEngine,
    request: &ProofRequest,
    selection: &RequestedCredentials,
    master_secret: &MasterSecret,
    objects: &ProverObjects,
) -> ProofResult<Proof> {
    validate_proof_request(request)?;
    tracing::debug!(
        nonce = %request.nonce,
        attrs = request.requested_attributes.len(),
        predicates = request.requested_predicates.len(),
        "creating proof"
    );

    for referent in selection
        .self_attested_attributes
        .keys()
        .chain(selection.requested_attributes.keys())
    {
        if !request.requested_attributes.contains_key(referent) {
            return Err(ProofError::InvalidRequest(format!(
                "{} is not a requested attribute",
                referent
            )));
        }
    }
    for referent in selection.requested_predicates.keys() {
        if !request.requested_predicates.contains_key(referent) {
            return Err(ProofError::InvalidRequest(format!(
                "{} is not a requested predicate",
                referent
            )));
        }
    }

    let mut requested_proof = RequestedProof::default();
    let mut sub_proofs = SubProofs::default();

    for (referent, info) in &request.requested_attributes {
        if let Some(value) = selection.self_attested_attributes.get(referent) {
            if info.is_restricted() {
                return Err(ProofError::CredentialRequestMismatch(format!(
                    "{} is restricted and cannot be self-attested",
                    referent
                )));
            }
            requested_proof
                .self_attested_attrs
                .insert(referent.clone(), value.clone());
            continue;
        }
        let chosen = selection.requested_attributes.get(referent).ok_or_else(|| {
            ProofError::InvalidRequest(format!("no credential selected for {}", referent))
        })?;

        let credential = lookup_credential(objects, referent, &chosen.cred_id)?;
        check_restrictions(referent, info.restrictions.as_deref(), &chosen.cred_id, credential)?;
        let attr_name = resolve_attr_name(credential.values.keys(), &info.name).ok_or_else(|| {
            ProofError::CredentialRequestMismatch(format!(
                "{}: credential {} has no attribute {}",
                referent, chosen.cred_id, info.name
            ))
        })?;
        let value = &credential.values[attr_name];
        if !verify_encoding(&value.raw, &value.encoded) {
            return Err(ProofError::EncodingMismatch(format!("{}: {}", referent, attr_name)));
        }

        let (rev_state, timestamp) = non_revocation(
            objects,
            referent,
            credential,
            request.attribute_interval(referent),
            chosen.timestamp,
        )?;
        let index = sub_proofs.slot(&chosen.cred_id, credential, rev_state, timestamp);

        if chosen.revealed {
            let sub = &mut sub_proofs.items[index as usize];
            sub.request.revealed_attrs.insert(attr_name.clone());
            requested_proof.revealed_attrs.insert(
                referent.clone(),
                RevealedAttributeInfo {
                    sub_proof_index: index,
                    raw: value.raw.clone(),
                    encoded: value.encoded.clone(),
                },
            );
        } else {
            requested_proof.unrevealed_attrs.insert(
                referent.clone(),
                SubProofReferent {
                    sub_proof_index: index,
                },
            );
        }
    }

    for (referent, info) in &request.requested_predicates {
        let chosen = selection.requested_predicates.get(referent).ok_or_else(|| {
            ProofError::InvalidRequest(format!("no credential selected for {}", referent))
        })?;

        let credential = lookup_credential(objects, referent, &chosen.cred_id)?;
        check_restrictions(referent, info.restrictions.as_deref(), &chosen.cred_id, credential)?;
        let attr_name = resolve_attr_name(credential.values.keys(), &info.name).ok_or_else(|| {
            ProofError::CredentialRequestMismatch(format!(
                "{}: credential {} has no attribute {}",
                referent, chosen.cred_id, info.name
            ))
        })?;
        let value = &credential.values[attr_name];
        if !predicate_holds(&value.raw, info.p_type, info.p_value) {
            return Err(ProofError::PredicateNotSatisfied(format!(
                "{}: {} {} {}",
                referent, attr_name, info.p_type, info.p_value
            )));
        }
        // The engine compares the encoded value; it must be the integer itself.
        let consistent = verify_encoding(&value.raw, &value.encoded)
            && value.encoded.parse::<i32>().ok() == value.raw.parse::<i32>().ok();
        if !consistent {
            return Err(ProofError::EncodingMismatch(format!("{}: {}", referent, attr_name)));
        }

        let (rev_state, timestamp) = non_revocation(
            objects,
            referent,
            credential,
            request.predicate_interval(referent),
            chosen.timestamp,
        )?;
        let index = sub_proofs.slot(&chosen.cred_id, credential, rev_state, timestamp);
        sub_proofs.items[index as usize]
            .request
            .predicates
            .push(PredicateSpec {
                attr_name: attr_name.clone(),
                p_type: info.p_type,
                value: info.p_value,
            });
        requested_proof.predicates.insert(
            referent.clone(),
            SubProofReferent {
                sub_proof_index: index,
            },
        );
    }

    let mut items = Vec::with_capacity(sub_proofs.items.len());
    let mut identifiers = Vec::with_capacity(sub_proofs.items.len());
    for sub in &sub_proofs.items {
        let credential = sub.credential;
        let cred_def = objects.cred_defs.get(&credential.cred_def_id).ok_or_else(|| {
            ProofError::MissingObject(format!("credential definition {}", credential.cred_def_id))
        })?;
        if !objects.schemas.contains_key(&credential.schema_id) {
            return Err(ProofError::MissingObject(format!("schema {}", credential.schema_id)));
        }
        identifiers.push(Identifier {
            schema_id: credential.schema_id.clone(),
            cred_def_id: credential.cred_def_id.clone(),
            rev_reg_id: sub.timestamp.and(credential.rev_reg_id.clone()),
            timestamp: sub.timestamp,
        });
        items.push(ProvingItem {
            credential,
            cred_def,
            rev_state: sub.rev_state,
            request: sub.request.clone(),
        });
    }

    let material = engine.create_proof(&request.nonce, master_secret, &items)?;
    tracing::info!(
        nonce = %request.nonce,
        sub_proofs = identifiers.len(),
        revealed = requested_proof.revealed_attrs.len(),
        "proof created"
    );
    Ok(Proof {
        proof: material,
        requested_proof,
        identifiers,
    })
}
