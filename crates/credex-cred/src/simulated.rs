//! Simulated proof engine.
//!
//! Ed25519 signatures over a per-attribute digest vector, and an XOR
//! multiset-hash accumulator where a witness is the XOR of every other active
//! element. It has the same inputs, outputs and failure behavior as a real CL
//! engine, but it is NOT zero-knowledge: proofs carry hashes of hidden
//! attributes and open the attributes used in predicates. Use it to drive the
//! protocol, not to protect holders.
//!
//! Nor does it enforce revocation cryptographically. The non-revocation
//! check is `witness ^ element(index) == accumulator`, and both the element
//! and the accumulator are public, so anyone can compute a passing witness
//! for any index. A revoked holder can forge one. Only a real accumulator
//! engine makes a revoked credential unprovable.

use crate::engine::{ProofEngine, ProvingItem, VerifyingItem};
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::types::*;
use credex_core::{hash_parts, hex_bytes, Digest32, Nonce, RevRegId};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use zeroize::Zeroizing;

#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedProofEngine;

impl SimulatedProofEngine {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize, Deserialize)]
struct SignatureData {
    #[serde(with = "hex_bytes")]
    signature: [u8; 64],
    blinded: Digest32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blinding: Option<Digest32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NonRevocationData {
    index: u32,
    witness: Digest32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SubProofData {
    cred_def_id: String,
    rev_reg_index: Option<u32>,
    blinded: Digest32,
    #[serde(with = "hex_bytes")]
    signature: [u8; 64],
    leaves: BTreeMap<String, Digest32>,
    openings: BTreeMap<String, String>,
    non_revocation: Option<NonRevocationData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ProofData {
    sub_proofs: Vec<SubProofData>,
    binding: Digest32,
}

fn engine_err(message: &str) -> CredErrorDetail {
    CredErrorDetail::new(CredError::EngineFailure, message)
}

fn random_32() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

fn to_digest(bytes: &[u8], what: &str) -> CredResult<Digest32> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| engine_err(&format!("{} must be 32 bytes", what)))?;
    Ok(Digest32(arr))
}

fn element(registry_id: &RevRegId, index: u32) -> Digest32 {
    hash_parts(&[b"element", registry_id.as_str().as_bytes(), &index.to_be_bytes()])
}

fn xor_elements<'a>(
    start: Digest32,
    registry_id: &RevRegId,
    indices: impl IntoIterator<Item = &'a u32>,
) -> Digest32 {
    indices
        .into_iter()
        .fold(start, |acc, idx| acc.xor(&element(registry_id, *idx)))
}

fn leaf(name: &str, encoded: &str) -> Digest32 {
    hash_parts(&[b"attr", name.as_bytes(), encoded.as_bytes()])
}

fn commit_secret(master_secret: &[u8], blinding: &Digest32) -> Digest32 {
    hash_parts(&[b"ms", master_secret, blinding.as_bytes()])
}

fn signing_message(
    cred_def_id: &str,
    rev_reg_index: Option<u32>,
    blinded: &Digest32,
    leaves: &BTreeMap<String, Digest32>,
) -> Digest32 {
    let index_bytes = rev_reg_index.map(|i| i.to_be_bytes().to_vec()).unwrap_or_default();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(4 + leaves.len() * 2);
    parts.push(b"credential");
    parts.push(cred_def_id.as_bytes());
    parts.push(&index_bytes);
    parts.push(blinded.as_bytes());
    for (name, digest) in leaves {
        parts.push(name.as_bytes());
        parts.push(digest.as_bytes());
    }
    hash_parts(&parts)
}

fn leaves_of(values: &CredentialValues) -> BTreeMap<String, Digest32> {
    values
        .iter()
        .map(|(name, v)| (name.clone(), leaf(name, &v.encoded)))
        .collect()
}

fn binding_of(nonce: &Nonce, sub_proofs: &[SubProofData]) -> CredResult<Digest32> {
    let body = serde_json::to_vec(sub_proofs)?;
    Ok(hash_parts(&[b"proof", nonce.as_str().as_bytes(), &body]))
}

fn verifying_key(cred_def: &CredentialDefinition) -> Option<VerifyingKey> {
    let bytes: [u8; 32] = cred_def.public_key.as_bytes().try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

fn decode_signature(signature: &CredentialSignature) -> CredResult<SignatureData> {
    serde_json::from_slice(signature.as_bytes())
        .map_err(|_| CredErrorDetail::new(CredError::InvalidSignature, "malformed signature"))
}

impl ProofEngine for SimulatedProofEngine {
    fn new_credential_keys(
        &self,
        _schema: &Schema,
        _supports_revocation: bool,
    ) -> CredResult<(CredentialPublicKey, CredentialPrivateKey)> {
        let seed = Zeroizing::new(random_32());
        let signing_key = SigningKey::from_bytes(&seed);
        Ok((
            CredentialPublicKey::from_bytes(signing_key.verifying_key().to_bytes().to_vec()),
            CredentialPrivateKey::from_bytes(seed.to_vec()),
        ))
    }

    fn new_registry_keys(
        &self,
        registry_id: &RevRegId,
        max_credential_count: u32,
    ) -> CredResult<RegistryPublicKey> {
        let salt = random_32();
        let key = hash_parts(&[
            b"registry",
            registry_id.as_str().as_bytes(),
            &max_credential_count.to_be_bytes(),
            &salt,
        ]);
        Ok(RegistryPublicKey::from_bytes(key.0.to_vec()))
    }

    fn accumulate(
        &self,
        registry_id: &RevRegId,
        prior: Option<&Accumulator>,
        issued: &BTreeSet<u32>,
        revoked: &BTreeSet<u32>,
    ) -> CredResult<Accumulator> {
        let start = match prior {
            Some(acc) => to_digest(acc.as_bytes(), "accumulator")?,
            None => Digest32::zero(),
        };
        let acc = xor_elements(start, registry_id, issued.iter().chain(revoked.iter()));
        Ok(Accumulator::from_bytes(acc.0.to_vec()))
    }

    fn new_master_secret(&self) -> CredResult<MasterSecret> {
        Ok(MasterSecret::from_bytes(random_32().to_vec()))
    }

    fn blind_master_secret(
        &self,
        master_secret: &MasterSecret,
    ) -> CredResult<(BlindedSecret, BlindingFactors)> {
        let blinding = Digest32(random_32());
        let blinded = commit_secret(master_secret.as_bytes(), &blinding);
        Ok((
            BlindedSecret::from_bytes(blinded.0.to_vec()),
            BlindingFactors::from_bytes(blinding.0.to_vec()),
        ))
    }

    fn sign(
        &self,
        cred_def: &CredentialDefinition,
        private_key: &CredentialPrivateKey,
        blinded: &BlindedSecret,
        values: &CredentialValues,
        rev_reg_index: Option<u32>,
    ) -> CredResult<CredentialSignature> {
        let seed: Zeroizing<[u8; 32]> = Zeroizing::new(
            private_key
                .as_bytes()
                .try_into()
                .map_err(|_| CredErrorDetail::from(CredError::SigningFailed))?,
        );
        let signing_key = SigningKey::from_bytes(&seed);
        let blinded = to_digest(blinded.as_bytes(), "blinded secret")?;
        let message = signing_message(cred_def.id.as_str(), rev_reg_index, &blinded, &leaves_of(values));
        let data = SignatureData {
            signature: signing_key.sign(message.as_bytes()).to_bytes(),
            blinded,
            blinding: None,
        };
        Ok(CredentialSignature::from_bytes(serde_json::to_vec(&data)?))
    }

    fn process_signature(
        &self,
        credential: &Credential,
        cred_def: &CredentialDefinition,
        master_secret: &MasterSecret,
        blinding: &BlindingFactors,
    ) -> CredResult<CredentialSignature> {
        let mut data = decode_signature(&credential.signature)?;
        let blinding = to_digest(blinding.as_bytes(), "blinding")?;
        if commit_secret(master_secret.as_bytes(), &blinding) != data.blinded {
            return Err(CredErrorDetail::new(
                CredError::InvalidSignature,
                "credential is not bound to this master secret",
            ));
        }
        let message = signing_message(
            cred_def.id.as_str(),
            credential.rev_reg_index,
            &data.blinded,
            &leaves_of(&credential.values),
        );
        let key = verifying_key(cred_def)
            .ok_or_else(|| CredErrorDetail::new(CredError::InvalidSignature, "bad public key"))?;
        key.verify(message.as_bytes(), &Signature::from_bytes(&data.signature))
            .map_err(|_| CredErrorDetail::from(CredError::InvalidSignature))?;

        data.blinding = Some(blinding);
        Ok(CredentialSignature::from_bytes(serde_json::to_vec(&data)?))
    }

    fn build_witness(
        &self,
        registry_id: &RevRegId,
        active: &BTreeSet<u32>,
        index: u32,
    ) -> CredResult<Witness> {
        let witness = xor_elements(
            Digest32::zero(),
            registry_id,
            active.iter().filter(|i| **i != index),
        );
        Ok(Witness::from_bytes(witness.0.to_vec()))
    }

    fn update_witness(
        &self,
        registry_id: &RevRegId,
        index: u32,
        witness: &Witness,
        issued: &BTreeSet<u32>,
        revoked: &BTreeSet<u32>,
    ) -> CredResult<Witness> {
        let start = to_digest(witness.as_bytes(), "witness")?;
        let updated = xor_elements(
            start,
            registry_id,
            issued.iter().chain(revoked.iter()).filter(|i| **i != index),
        );
        Ok(Witness::from_bytes(updated.0.to_vec()))
    }

    fn create_proof(
        &self,
        nonce: &Nonce,
        master_secret: &MasterSecret,
        items: &[ProvingItem<'_>],
    ) -> CredResult<ProofMaterial> {
        let mut sub_proofs = Vec::with_capacity(items.len());
        for item in items {
            let data = decode_signature(&item.credential.signature)?;
            let blinding = data.blinding.ok_or_else(|| {
                CredErrorDetail::new(CredError::InvalidSignature, "credential was never processed")
            })?;
            if commit_secret(master_secret.as_bytes(), &blinding) != data.blinded {
                return Err(CredErrorDetail::new(
                    CredError::InvalidSignature,
                    "credential is not bound to this master secret",
                ));
            }

            let values = &item.credential.values;
            let mut openings = BTreeMap::new();
            let opened = item
                .request
                .revealed_attrs
                .iter()
                .chain(item.request.predicates.iter().map(|p| &p.attr_name));
            for name in opened {
                let value = values.get(name).ok_or_else(|| {
                    CredErrorDetail::new(
                        CredError::InvalidRequest(format!("credential has no attribute {}", name)),
                        "requested attribute missing from credential",
                    )
                })?;
                openings.insert(name.clone(), value.encoded.clone());
            }
            for predicate in &item.request.predicates {
                let holds = openings
                    .get(&predicate.attr_name)
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|v| predicate.p_type.holds(v, predicate.value))
                    .unwrap_or(false);
                if !holds {
                    return Err(CredErrorDetail::new(
                        CredError::InvalidRequest(format!(
                            "predicate on {} not satisfied",
                            predicate.attr_name
                        )),
                        "predicate not satisfied",
                    ));
                }
            }

            let non_revocation = match (item.rev_state, item.credential.rev_reg_index) {
                (Some(state), Some(index)) => Some(NonRevocationData {
                    index,
                    witness: to_digest(state.witness.as_bytes(), "witness")?,
                }),
                _ => None,
            };

            sub_proofs.push(SubProofData {
                cred_def_id: item.cred_def.id.as_str().to_string(),
                rev_reg_index: item.credential.rev_reg_index,
                blinded: data.blinded,
                signature: data.signature,
                leaves: leaves_of(values),
                openings,
                non_revocation,
            });
        }

        let binding = binding_of(nonce, &sub_proofs)?;
        let proof = ProofData {
            sub_proofs,
            binding,
        };
        Ok(ProofMaterial::from_bytes(serde_json::to_vec(&proof)?))
    }

    fn verify_proof(
        &self,
        nonce: &Nonce,
        items: &[VerifyingItem<'_>],
        proof: &ProofMaterial,
    ) -> CredResult<bool> {
        let data: ProofData = match serde_json::from_slice(proof.as_bytes()) {
            Ok(d) => d,
            Err(_) => {
                tracing::debug!("proof material does not decode");
                return Ok(false);
            }
        };
        if data.sub_proofs.len() != items.len() {
            tracing::debug!("sub-proof count mismatch");
            return Ok(false);
        }
        if binding_of(nonce, &data.sub_proofs)? != data.binding {
            tracing::debug!("proof is not bound to this nonce");
            return Ok(false);
        }

        for (item, sub) in items.iter().zip(&data.sub_proofs) {
            if !verify_sub_proof(item, sub) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn verify_sub_proof(item: &VerifyingItem<'_>, sub: &SubProofData) -> bool {
    if sub.cred_def_id != item.cred_def.id.as_str() {
        tracing::debug!(cred_def_id = %item.cred_def.id, "sub-proof for another credential definition");
        return false;
    }

    let message = signing_message(&sub.cred_def_id, sub.rev_reg_index, &sub.blinded, &sub.leaves);
    let signature_ok = verifying_key(item.cred_def)
        .map(|key| {
            key.verify(message.as_bytes(), &Signature::from_bytes(&sub.signature))
                .is_ok()
        })
        .unwrap_or(false);
    if !signature_ok {
        tracing::debug!(cred_def_id = %item.cred_def.id, "credential signature invalid");
        return false;
    }

    for (name, encoded) in &sub.openings {
        if sub.leaves.get(name) != Some(&leaf(name, encoded)) {
            tracing::debug!(attr = %name, "opening does not match signed attribute");
            return false;
        }
    }
    for name in &item.request.revealed_attrs {
        let claimed = item.revealed.get(name);
        if claimed.is_none() || sub.openings.get(name) != claimed {
            tracing::debug!(attr = %name, "revealed value does not match proof");
            return false;
        }
    }
    for predicate in &item.request.predicates {
        let holds = sub
            .openings
            .get(&predicate.attr_name)
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| predicate.p_type.holds(v, predicate.value))
            .unwrap_or(false);
        if !holds {
            tracing::debug!(attr = %predicate.attr_name, "predicate does not hold");
            return false;
        }
    }

    if let Some(registry) = item.registry {
        let Some(nr) = &sub.non_revocation else {
            tracing::debug!(registry_id = %registry.registry_id, "missing non-revocation proof");
            return false;
        };
        if sub.rev_reg_index != Some(nr.index) {
            return false;
        }
        let Ok(accumulator) = to_digest(registry.accumulator.as_bytes(), "accumulator") else {
            return false;
        };
        if nr.witness.xor(&element(&registry.registry_id, nr.index)) != accumulator {
            tracing::debug!(registry_id = %registry.registry_id, index = nr.index, "witness does not open accumulator");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SubProofRequest;
    use credex_core::{CredDefId, IssuerDid, SchemaId, Timestamp};

    fn schema() -> Schema {
        Schema {
            id: SchemaId::new("did:2:gvt:1.0"),
            issuer_did: IssuerDid::new("did"),
            name: "gvt".into(),
            version: "1.0".into(),
            attr_names: ["name", "age"].iter().map(|s| s.to_string()).collect(),
        }
    }

    fn cred_def(engine: &SimulatedProofEngine) -> (CredentialDefinition, CredentialPrivateKey) {
        let (public_key, private_key) = engine.new_credential_keys(&schema(), true).unwrap();
        (
            CredentialDefinition {
                id: CredDefId::new("did:3:CL:did:2:gvt:1.0:tag"),
                schema_id: schema().id,
                issuer_did: IssuerDid::new("did"),
                tag: "tag".into(),
                signature_type: "CL".into(),
                supports_revocation: true,
                public_key,
            },
            private_key,
        )
    }

    fn rr() -> RevRegId {
        RevRegId::new("rr")
    }

    fn set(items: &[u32]) -> BTreeSet<u32> {
        items.iter().copied().collect()
    }

    struct Issued {
        engine: SimulatedProofEngine,
        def: CredentialDefinition,
        ms: MasterSecret,
        credential: Credential,
    }

    fn issue(index: Option<u32>) -> Issued {
        let engine = SimulatedProofEngine::new();
        let (def, sk) = cred_def(&engine);
        let ms = engine.new_master_secret().unwrap();
        let (blinded, blinding) = engine.blind_master_secret(&ms).unwrap();
        let values = encode_values([("name", "Alex"), ("age", "28")]);
        let signature = engine.sign(&def, &sk, &blinded, &values, index).unwrap();
        let mut credential = Credential {
            schema_id: def.schema_id.clone(),
            cred_def_id: def.id.clone(),
            rev_reg_id: index.map(|_| rr()),
            rev_reg_index: index,
            values,
            signature,
        };
        credential.signature = engine
            .process_signature(&credential, &def, &ms, &blinding)
            .unwrap();
        Issued {
            engine,
            def,
            ms,
            credential,
        }
    }

    fn state_for(engine: &SimulatedProofEngine, active: &[u32], index: u32) -> (RevocationState, RevocationRegistry) {
        let acc = engine.accumulate(&rr(), None, &set(active), &set(&[])).unwrap();
        let witness = engine.build_witness(&rr(), &set(active), index).unwrap();
        (
            RevocationState {
                registry_id: rr(),
                index,
                timestamp: Timestamp(100),
                accumulator: acc.clone(),
                accumulator_as_of: Timestamp(100),
                ledger_seq_no: None,
                status: RevocationStatus::Active,
                witness,
            },
            RevocationRegistry {
                registry_id: rr(),
                accumulator: acc,
                as_of: Timestamp(100),
            },
        )
    }

    #[test]
    fn test_accumulate_is_order_independent() {
        let engine = SimulatedProofEngine::new();
        let a = engine.accumulate(&rr(), None, &set(&[0, 1, 2]), &set(&[])).unwrap();
        let step = engine.accumulate(&rr(), None, &set(&[2]), &set(&[])).unwrap();
        let b = engine.accumulate(&rr(), Some(&step), &set(&[0, 1]), &set(&[])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_witness_opens_accumulator_until_revoked() {
        let engine = SimulatedProofEngine::new();
        let acc = engine.accumulate(&rr(), None, &set(&[0, 1, 2]), &set(&[])).unwrap();
        let witness = engine.build_witness(&rr(), &set(&[0, 1, 2]), 1).unwrap();
        let w = to_digest(witness.as_bytes(), "w").unwrap();
        let a = to_digest(acc.as_bytes(), "a").unwrap();
        assert_eq!(w.xor(&element(&rr(), 1)), a);

        let revoked = engine.accumulate(&rr(), Some(&acc), &set(&[]), &set(&[1])).unwrap();
        let updated = engine
            .update_witness(&rr(), 1, &witness, &set(&[]), &set(&[1]))
            .unwrap();
        let w = to_digest(updated.as_bytes(), "w").unwrap();
        let a = to_digest(revoked.as_bytes(), "a").unwrap();
        assert_ne!(w.xor(&element(&rr(), 1)), a);
    }

    #[test]
    fn test_witness_can_be_derived_from_public_values() {
        // Known limitation: the accumulator alone yields a passing witness,
        // even for a revoked index.
        let engine = SimulatedProofEngine::new();
        let acc = engine.accumulate(&rr(), None, &set(&[0, 1]), &set(&[])).unwrap();
        let revoked = engine.accumulate(&rr(), Some(&acc), &set(&[]), &set(&[1])).unwrap();
        let a = to_digest(revoked.as_bytes(), "a").unwrap();
        let forged = a.xor(&element(&rr(), 1));
        assert_eq!(forged.xor(&element(&rr(), 1)), a);
    }

    #[test]
    fn test_update_witness_matches_rebuild() {
        let engine = SimulatedProofEngine::new();
        let w0 = engine.build_witness(&rr(), &set(&[0, 1]), 0).unwrap();
        let w1 = engine
            .update_witness(&rr(), 0, &w0, &set(&[2, 3]), &set(&[1]))
            .unwrap();
        let rebuilt = engine.build_witness(&rr(), &set(&[0, 2, 3]), 0).unwrap();
        assert_eq!(w1, rebuilt);
    }

    #[test]
    fn test_process_signature_rejects_foreign_master_secret() {
        let engine = SimulatedProofEngine::new();
        let (def, sk) = cred_def(&engine);
        let ms = engine.new_master_secret().unwrap();
        let other = engine.new_master_secret().unwrap();
        let (blinded, blinding) = engine.blind_master_secret(&ms).unwrap();
        let values = encode_values([("name", "Alex"), ("age", "28")]);
        let signature = engine.sign(&def, &sk, &blinded, &values, None).unwrap();
        let credential = Credential {
            schema_id: def.schema_id.clone(),
            cred_def_id: def.id.clone(),
            rev_reg_id: None,
            rev_reg_index: None,
            values,
            signature,
        };
        let err = engine
            .process_signature(&credential, &def, &other, &blinding)
            .unwrap_err();
        assert_eq!(err.kind, CredError::InvalidSignature);
    }

    #[test]
    fn test_process_signature_rejects_tampered_values() {
        let engine = SimulatedProofEngine::new();
        let (def, sk) = cred_def(&engine);
        let ms = engine.new_master_secret().unwrap();
        let (blinded, blinding) = engine.blind_master_secret(&ms).unwrap();
        let values = encode_values([("name", "Alex"), ("age", "28")]);
        let signature = engine.sign(&def, &sk, &blinded, &values, None).unwrap();
        let credential = Credential {
            schema_id: def.schema_id.clone(),
            cred_def_id: def.id.clone(),
            rev_reg_id: None,
            rev_reg_index: None,
            values: encode_values([("name", "Alex"), ("age", "82")]),
            signature,
        };
        assert!(engine
            .process_signature(&credential, &def, &ms, &blinding)
            .is_err());
    }

    #[test]
    fn test_proof_round_trip_with_revocation() {
        let issued = issue(Some(0));
        let (state, registry) = state_for(&issued.engine, &[0, 1], 0);
        let nonce = Nonce::generate();
        let request = SubProofRequest::default()
            .reveal("name")
            .predicate("age", PredicateType::GE, 18);
        let proof = issued
            .engine
            .create_proof(
                &nonce,
                &issued.ms,
                &[ProvingItem {
                    credential: &issued.credential,
                    cred_def: &issued.def,
                    rev_state: Some(&state),
                    request: request.clone(),
                }],
            )
            .unwrap();

        let revealed: BTreeMap<String, String> = [(
            "name".to_string(),
            issued.credential.values["name"].encoded.clone(),
        )]
        .into_iter()
        .collect();
        let item = VerifyingItem {
            cred_def: &issued.def,
            registry: Some(&registry),
            request,
            revealed,
        };
        assert!(issued
            .engine
            .verify_proof(&nonce, std::slice::from_ref(&item), &proof)
            .unwrap());

        // Another nonce must not verify.
        assert!(!issued
            .engine
            .verify_proof(&Nonce::generate(), std::slice::from_ref(&item), &proof)
            .unwrap());

        // A registry where index 0 was revoked must not verify.
        let revoked_acc = issued
            .engine
            .accumulate(&rr(), Some(&registry.accumulator), &set(&[]), &set(&[0]))
            .unwrap();
        let revoked = RevocationRegistry {
            accumulator: revoked_acc,
            ..registry.clone()
        };
        let item = VerifyingItem {
            registry: Some(&revoked),
            ..item
        };
        assert!(!issued.engine.verify_proof(&nonce, &[item], &proof).unwrap());
    }

    #[test]
    fn test_wrong_revealed_value_fails() {
        let issued = issue(None);
        let nonce = Nonce::generate();
        let request = SubProofRequest::default().reveal("name");
        let proof = issued
            .engine
            .create_proof(
                &nonce,
                &issued.ms,
                &[ProvingItem {
                    credential: &issued.credential,
                    cred_def: &issued.def,
                    rev_state: None,
                    request: request.clone(),
                }],
            )
            .unwrap();
        let item = VerifyingItem {
            cred_def: &issued.def,
            registry: None,
            request,
            revealed: [("name".to_string(), AttributeValue::from_raw("Bob").encoded)]
                .into_iter()
                .collect(),
        };
        assert!(!issued.engine.verify_proof(&nonce, &[item], &proof).unwrap());
    }

    #[test]
    fn test_unsatisfied_predicate_is_refused() {
        let issued = issue(None);
        let err = issued
            .engine
            .create_proof(
                &Nonce::generate(),
                &issued.ms,
                &[ProvingItem {
                    credential: &issued.credential,
                    cred_def: &issued.def,
                    rev_state: None,
                    request: SubProofRequest::default().predicate("age", PredicateType::GT, 30),
                }],
            )
            .unwrap_err();
        assert!(matches!(err.kind, CredError::InvalidRequest(_)));
    }

    #[test]
    fn test_garbage_proof_is_false_not_error() {
        let issued = issue(None);
        let item = VerifyingItem {
            cred_def: &issued.def,
            registry: None,
            request: SubProofRequest::default(),
            revealed: BTreeMap::new(),
        };
        let garbage = ProofMaterial::from_bytes(b"not a proof".to_vec());
        assert!(!issued
            .engine
            .verify_proof(&Nonce::generate(), &[item], &garbage)
            .unwrap());
    }
}
