//! Proof engine boundary.
//!
//! The engine owns every piece of signature, accumulator and proof
//! arithmetic. The protocol layer only moves its outputs around as opaque
//! blobs and inspects the few plain fields it needs (indices, timestamps,
//! raw attribute values).

use crate::error::CredResult;
use crate::types::*;
use credex_core::{Nonce, RevRegId};
use std::collections::{BTreeMap, BTreeSet};

/// A predicate the engine must prove over one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateSpec {
    pub attr_name: String,
    pub p_type: PredicateType,
    pub value: i64,
}

/// What one credential contributes to a proof. Attribute names are the
/// credential's own names, already resolved from the request's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubProofRequest {
    pub revealed_attrs: BTreeSet<String>,
    pub predicates: Vec<PredicateSpec>,
}

impl SubProofRequest {
    pub fn reveal(mut self, attr_name: impl Into<String>) -> Self {
        self.revealed_attrs.insert(attr_name.into());
        self
    }

    pub fn predicate(mut self, attr_name: impl Into<String>, p_type: PredicateType, value: i64) -> Self {
        self.predicates.push(PredicateSpec {
            attr_name: attr_name.into(),
            p_type,
            value,
        });
        self
    }
}

/// Prover-side input for one sub-proof.
#[derive(Debug, Clone)]
pub struct ProvingItem<'a> {
    pub credential: &'a Credential,
    pub cred_def: &'a CredentialDefinition,
    pub rev_state: Option<&'a RevocationState>,
    pub request: SubProofRequest,
}

/// Verifier-side input for one sub-proof.
#[derive(Debug, Clone)]
pub struct VerifyingItem<'a> {
    pub cred_def: &'a CredentialDefinition,
    /// Registry state the verifier trusts, when revocation is checked.
    pub registry: Option<&'a RevocationRegistry>,
    pub request: SubProofRequest,
    /// Encoded values the proof claims for the revealed attributes.
    pub revealed: BTreeMap<String, String>,
}

pub trait ProofEngine: Send + Sync {
    fn new_credential_keys(
        &self,
        schema: &Schema,
        supports_revocation: bool,
    ) -> CredResult<(CredentialPublicKey, CredentialPrivateKey)>;

    fn new_registry_keys(
        &self,
        registry_id: &RevRegId,
        max_credential_count: u32,
    ) -> CredResult<RegistryPublicKey>;

    /// Fold index changes into an accumulator. `prior` of `None` is the
    /// empty accumulator of the registry.
    fn accumulate(
        &self,
        registry_id: &RevRegId,
        prior: Option<&Accumulator>,
        issued: &BTreeSet<u32>,
        revoked: &BTreeSet<u32>,
    ) -> CredResult<Accumulator>;

    fn new_master_secret(&self) -> CredResult<MasterSecret>;

    fn blind_master_secret(
        &self,
        master_secret: &MasterSecret,
    ) -> CredResult<(BlindedSecret, BlindingFactors)>;

    fn sign(
        &self,
        cred_def: &CredentialDefinition,
        private_key: &CredentialPrivateKey,
        blinded: &BlindedSecret,
        values: &CredentialValues,
        rev_reg_index: Option<u32>,
    ) -> CredResult<CredentialSignature>;

    /// Prover-side acceptance: checks the issuer's signature and folds the
    /// blinding into it so the credential can be used in proofs.
    fn process_signature(
        &self,
        credential: &Credential,
        cred_def: &CredentialDefinition,
        master_secret: &MasterSecret,
        blinding: &BlindingFactors,
    ) -> CredResult<CredentialSignature>;

    /// Witness for `index` given the set of indices active at the target time.
    fn build_witness(
        &self,
        registry_id: &RevRegId,
        active: &BTreeSet<u32>,
        index: u32,
    ) -> CredResult<Witness>;

    /// Advance a witness across later index changes.
    fn update_witness(
        &self,
        registry_id: &RevRegId,
        index: u32,
        witness: &Witness,
        issued: &BTreeSet<u32>,
        revoked: &BTreeSet<u32>,
    ) -> CredResult<Witness>;

    fn create_proof(
        &self,
        nonce: &Nonce,
        master_secret: &MasterSecret,
        items: &[ProvingItem<'_>],
    ) -> CredResult<ProofMaterial>;

    /// `Ok(false)` for any proof that does not check out.
    fn verify_proof(
        &self,
        nonce: &Nonce,
        items: &[VerifyingItem<'_>],
        proof: &ProofMaterial,
    ) -> CredResult<bool>;
}
