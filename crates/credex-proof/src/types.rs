use credex_core::{CredDefId, CredentialId, Nonce, RevRegId, SchemaId, Timestamp};
use credex_cred::{
    Credential, CredentialDefinition, CredentialInfo, Filter, PredicateType, ProofMaterial,
    RevocationRegistry, RevocationRegistryDefinition, RevocationState, Schema,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ProofRequest: what a verifier asks for
// ---------------------------------------------------------------------------

/// Interval over which a credential must be shown not revoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonRevokedInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Timestamp>,
}

impl NonRevokedInterval {
    pub fn new(from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        Self { from, to }
    }

    pub fn to(to: Timestamp) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    /// The time a revocation state has to reach: `to`, else `from`.
    pub fn effective_time(&self) -> Option<Timestamp> {
        self.to.or(self.from)
    }

    /// A state taken at `timestamp` covers this interval.
    pub fn is_covered_by(&self, timestamp: Timestamp) -> bool {
        self.effective_time().map_or(false, |t| timestamp >= t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl AttributeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            restrictions: None,
            non_revoked: None,
        }
    }

    pub fn restrict(mut self, filter: Filter) -> Self {
        self.restrictions.get_or_insert_with(Vec::new).push(filter);
        self
    }

    pub fn non_revoked(mut self, interval: NonRevokedInterval) -> Self {
        self.non_revoked = Some(interval);
        self
    }

    pub fn is_restricted(&self) -> bool {
        self.restrictions.as_ref().is_some_and(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateInfo {
    pub name: String,
    pub p_type: PredicateType,
    pub p_value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl PredicateInfo {
    pub fn new(name: impl Into<String>, p_type: PredicateType, p_value: i64) -> Self {
        Self {
            name: name.into(),
            p_type,
            p_value,
            restrictions: None,
            non_revoked: None,
        }
    }

    pub fn restrict(mut self, filter: Filter) -> Self {
        self.restrictions.get_or_insert_with(Vec::new).push(filter);
        self
    }

    pub fn non_revoked(mut self, interval: NonRevokedInterval) -> Self {
        self.non_revoked = Some(interval);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    pub nonce: Nonce,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, AttributeInfo>,
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, PredicateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl ProofRequest {
    /// A referent's own interval overrides the request-level one.
    pub fn attribute_interval(&self, referent: &str) -> Option<NonRevokedInterval> {
        self.requested_attributes
            .get(referent)
            .and_then(|a| a.non_revoked)
            .or(self.non_revoked)
    }

    pub fn predicate_interval(&self, referent: &str) -> Option<NonRevokedInterval> {
        self.requested_predicates
            .get(referent)
            .and_then(|p| p.non_revoked)
            .or(self.non_revoked)
    }
}

// ---------------------------------------------------------------------------
// Proof: what a prover answers with
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedAttributeInfo {
    pub sub_proof_index: u32,
    pub raw: String,
    pub encoded: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProofReferent {
    pub sub_proof_index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedProof {
    #[serde(default)]
    pub revealed_attrs: BTreeMap<String, RevealedAttributeInfo>,
    #[serde(default)]
    pub unrevealed_attrs: BTreeMap<String, SubProofReferent>,
    #[serde(default)]
    pub self_attested_attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub predicates: BTreeMap<String, SubProofReferent>,
}

/// Ledger objects one sub-proof was made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevRegId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub proof: ProofMaterial,
    pub requested_proof: RequestedProof,
    pub identifiers: Vec<Identifier>,
}

// ---------------------------------------------------------------------------
// Prover inputs
// ---------------------------------------------------------------------------

/// A stored credential that can answer one referent, with the interval the
/// referent wants it shown non-revoked over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMatch {
    pub cred_info: CredentialInfo,
    pub interval: Option<NonRevokedInterval>,
}

/// Candidates per referent. Every match is returned; choosing is the
/// caller's business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsForRequest {
    pub attrs: BTreeMap<String, Vec<CredentialMatch>>,
    pub predicates: BTreeMap<String, Vec<CredentialMatch>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    pub cred_id: CredentialId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    pub revealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPredicate {
    pub cred_id: CredentialId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

/// The prover's choice of credential (and revocation timestamp) per referent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedCredentials {
    #[serde(default)]
    pub self_attested_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, RequestedAttribute>,
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, RequestedPredicate>,
}

impl RequestedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn self_attest(mut self, referent: impl Into<String>, value: impl Into<String>) -> Self {
        self.self_attested_attributes.insert(referent.into(), value.into());
        self
    }

    pub fn attribute(
        mut self,
        referent: impl Into<String>,
        cred_id: CredentialId,
        timestamp: Option<Timestamp>,
        revealed: bool,
    ) -> Self {
        self.requested_attributes.insert(
            referent.into(),
            RequestedAttribute {
                cred_id,
                timestamp,
                revealed,
            },
        );
        self
    }

    pub fn predicate(
        mut self,
        referent: impl Into<String>,
        cred_id: CredentialId,
        timestamp: Option<Timestamp>,
    ) -> Self {
        self.requested_predicates.insert(
            referent.into(),
            RequestedPredicate { cred_id, timestamp },
        );
        self
    }
}

/// Everything a prover holds for one presentation, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ProverObjects {
    pub credentials: BTreeMap<CredentialId, Credential>,
    pub schemas: BTreeMap<SchemaId, Schema>,
    pub cred_defs: BTreeMap<CredDefId, CredentialDefinition>,
    /// Looked up by registry, index and timestamp.
    pub rev_states: Vec<RevocationState>,
}

impl ProverObjects {
    pub fn rev_state(
        &self,
        registry_id: &RevRegId,
        index: u32,
        timestamp: Timestamp,
    ) -> Option<&RevocationState> {
        self.rev_states.iter().find(|s| {
            s.registry_id == *registry_id && s.index == index && s.timestamp == timestamp
        })
    }
}

/// Ledger objects a verifier resolved on its own, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct VerifierObjects {
    pub schemas: BTreeMap<SchemaId, Schema>,
    pub cred_defs: BTreeMap<CredDefId, CredentialDefinition>,
    pub rev_reg_defs: BTreeMap<RevRegId, RevocationRegistryDefinition>,
    /// Registry accumulators at the timestamps the proof names.
    pub rev_regs: BTreeMap<RevRegId, BTreeMap<Timestamp, RevocationRegistry>>,
}

impl VerifierObjects {
    pub fn registry_at(&self, id: &RevRegId, timestamp: Timestamp) -> Option<&RevocationRegistry> {
        self.rev_regs.get(id).and_then(|by_time| by_time.get(&timestamp))
    }
}
