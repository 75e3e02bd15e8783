use credex_core::{CredDefId, IssuerDid, Nonce, RevRegId, SchemaId, SeqNo, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use zeroize::Zeroizing;

// ---------------------------------------------------------------------------
// Opaque engine material: bytes the protocol layer never interprets
// ---------------------------------------------------------------------------

/// Opaque byte string produced or consumed by a proof engine. Base64 on the wire.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blob(#[serde(with = "b64")] pub Vec<u8>);

impl Blob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.0[..self.0.len().min(6)];
        write!(f, "Blob({} bytes, {}..)", self.0.len(), hex::encode(head))
    }
}

macro_rules! define_blob {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Blob);

        impl $name {
            pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
                Self(Blob(bytes.into()))
            }

            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

define_blob!(CredentialPublicKey, "Public half of a credential signing key.");
define_blob!(RegistryPublicKey, "Public parameters of a revocation registry.");
define_blob!(Accumulator, "Accumulator value of a revocation registry.");
define_blob!(Witness, "Non-revocation witness for one registry index.");
define_blob!(CredentialSignature, "Issuer signature over a credential.");
define_blob!(BlindedSecret, "Commitment to a master secret sent to an issuer.");
define_blob!(ProofMaterial, "Aggregate proof produced by a proof engine.");

macro_rules! define_secret {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(#[serde(with = "b64_secret")] Zeroizing<Vec<u8>>);

        impl $name {
            pub fn from_bytes(bytes: Vec<u8>) -> Self {
                Self(Zeroizing::new(bytes))
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(<redacted>)", stringify!($name))
            }
        }
    };
}

define_secret!(CredentialPrivateKey, "Private half of a credential signing key.");
define_secret!(MasterSecret, "Prover-held secret linking all of its credentials.");
define_secret!(BlindingFactors, "Prover-held opening of a blinded master secret.");

// ---------------------------------------------------------------------------
// Schema and definitions: immutable once published
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub id: SchemaId,
    pub issuer_did: IssuerDid,
    pub name: String,
    pub version: String,
    pub attr_names: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDefinition {
    pub id: CredDefId,
    pub schema_id: SchemaId,
    pub issuer_did: IssuerDid,
    pub tag: String,
    pub signature_type: String,
    pub supports_revocation: bool,
    pub public_key: CredentialPublicKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssuanceMode {
    /// Indices become issued one at a time, as credentials are issued.
    #[serde(rename = "ISSUANCE_ON_DEMAND")]
    OnDemand,
    /// Every index is issued at registry creation.
    #[serde(rename = "ISSUANCE_BY_DEFAULT")]
    ByDefault,
}

impl fmt::Display for IssuanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuanceMode::OnDemand => write!(f, "ISSUANCE_ON_DEMAND"),
            IssuanceMode::ByDefault => write!(f, "ISSUANCE_BY_DEFAULT"),
        }
    }
}

impl std::str::FromStr for IssuanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ISSUANCE_ON_DEMAND" | "on_demand" => Ok(IssuanceMode::OnDemand),
            "ISSUANCE_BY_DEFAULT" | "by_default" => Ok(IssuanceMode::ByDefault),
            other => Err(format!("unknown issuance mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistryDefinition {
    pub id: RevRegId,
    pub cred_def_id: CredDefId,
    pub issuer_did: IssuerDid,
    pub tag: String,
    pub max_credential_count: u32,
    pub issuance_mode: IssuanceMode,
    pub public_keys: RegistryPublicKey,
    pub tails_location: String,
    pub tails_hash: String,
}

// ---------------------------------------------------------------------------
// RevocationRegistryDelta: the only mutation unit of a registry
// ---------------------------------------------------------------------------

/// Change to a registry's index sets and accumulator over `(valid_from, valid_to]`.
///
/// `prior_accumulator` is `None` for the genesis delta. Deltas built locally
/// carry no interval; the interval is stamped from ledger transaction times
/// when deltas are read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistryDelta {
    pub registry_id: RevRegId,
    pub issued: BTreeSet<u32>,
    pub revoked: BTreeSet<u32>,
    pub prior_accumulator: Option<Accumulator>,
    pub new_accumulator: Accumulator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<Timestamp>,
}

impl RevocationRegistryDelta {
    pub fn is_genesis(&self) -> bool {
        self.prior_accumulator.is_none()
    }

    /// Stamped with a ledger interval.
    pub fn is_published(&self) -> bool {
        self.valid_to.is_some()
    }

    /// Every index this delta mentions.
    pub fn touched(&self) -> BTreeSet<u32> {
        self.issued.union(&self.revoked).copied().collect()
    }

    /// The delta as it is written to the ledger, without its interval.
    pub fn unstamped(&self) -> Self {
        Self {
            valid_from: None,
            valid_to: None,
            ..self.clone()
        }
    }
}

/// Accumulator of a registry as seen at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistry {
    pub registry_id: RevRegId,
    pub accumulator: Accumulator,
    /// Ledger time of the entry that produced this accumulator.
    pub as_of: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationStatus {
    Active,
    Revoked,
}

/// Non-revocation witness of one index, valid at `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationState {
    pub registry_id: RevRegId,
    pub index: u32,
    pub timestamp: Timestamp,
    pub accumulator: Accumulator,
    /// Ledger time of the latest delta folded into `accumulator`.
    pub accumulator_as_of: Timestamp,
    /// Sequence number of that delta, when the chain was read from a ledger.
    /// Several entries can share one second; this tells them apart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_seq_no: Option<SeqNo>,
    pub status: RevocationStatus,
    pub witness: Witness,
}

impl RevocationState {
    pub fn is_revoked(&self) -> bool {
        self.status == RevocationStatus::Revoked
    }
}

// ---------------------------------------------------------------------------
// Issuance messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOffer {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub nonce: Nonce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub prover_did: Option<IssuerDid>,
    pub cred_def_id: CredDefId,
    pub blinded_ms: BlindedSecret,
    /// Nonce of the offer this request answers.
    pub offer_nonce: Nonce,
    pub nonce: Nonce,
}

/// Prover-private data needed to accept the credential a request produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRequestMetadata {
    pub master_secret_name: String,
    pub blinding: BlindingFactors,
    pub nonce: Nonce,
    pub cred_def_id: CredDefId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub raw: String,
    pub encoded: String,
}

impl AttributeValue {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let encoded = credex_core::encode_attribute(&raw);
        Self { raw, encoded }
    }
}

pub type CredentialValues = BTreeMap<String, AttributeValue>;

/// Encode a map of raw values.
pub fn encode_values<K, V, I>(raw: I) -> CredentialValues
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    raw.into_iter()
        .map(|(k, v)| (k.into(), AttributeValue::from_raw(v)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub rev_reg_id: Option<RevRegId>,
    pub rev_reg_index: Option<u32>,
    pub values: CredentialValues,
    pub signature: CredentialSignature,
}

// ---------------------------------------------------------------------------
// Prover-side records
// ---------------------------------------------------------------------------

/// Searchable summary of a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
    pub referent: credex_core::CredentialId,
    pub attrs: BTreeMap<String, String>,
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub rev_reg_id: Option<RevRegId>,
    pub cred_rev_id: Option<u32>,
}

/// Restriction on which credentials may satisfy a referent. Every field that
/// is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<SchemaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_issuer_did: Option<IssuerDid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_did: Option<IssuerDid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<CredDefId>,
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateType {
    #[serde(rename = ">=")]
    GE,
    #[serde(rename = ">")]
    GT,
    #[serde(rename = "<=")]
    LE,
    #[serde(rename = "<")]
    LT,
}

impl PredicateType {
    pub fn holds(&self, value: i64, threshold: i64) -> bool {
        match self {
            PredicateType::GE => value >= threshold,
            PredicateType::GT => value > threshold,
            PredicateType::LE => value <= threshold,
            PredicateType::LT => value < threshold,
        }
    }
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateType::GE => write!(f, ">="),
            PredicateType::GT => write!(f, ">"),
            PredicateType::LE => write!(f, "<="),
            PredicateType::LT => write!(f, "<"),
        }
    }
}

// ---------------------------------------------------------------------------
// Base64 serialization helpers
// ---------------------------------------------------------------------------

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

mod b64_secret {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};
    use zeroize::Zeroizing;

    pub fn serialize<S: Serializer>(
        bytes: &Zeroizing<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded = Zeroizing::new(STANDARD.encode(bytes.as_slice()));
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Zeroizing<Vec<u8>>, D::Error> {
        let s = Zeroizing::new(String::deserialize(deserializer)?);
        STANDARD
            .decode(s.as_bytes())
            .map(Zeroizing::new)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_is_base64_on_the_wire() {
        let acc = Accumulator::from_bytes(vec![1, 2, 3]);
        let json = serde_json::to_string(&acc).unwrap();
        assert_eq!(json, "\"AQID\"");
        let back: Accumulator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, acc);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let ms = MasterSecret::from_bytes(vec![0x42; 32]);
        assert_eq!(format!("{:?}", ms), "MasterSecret(<redacted>)");
        let json = serde_json::to_string(&ms).unwrap();
        let back: MasterSecret = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_bytes(), ms.as_bytes());
    }

    #[test]
    fn test_attribute_value_encoding() {
        let v = AttributeValue::from_raw("28");
        assert_eq!(v.encoded, "28");
        let values = encode_values([("name", "Alex"), ("age", "28")]);
        assert_eq!(values.len(), 2);
        assert_ne!(values["name"].encoded, "Alex");
    }

    #[test]
    fn test_issuance_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&IssuanceMode::OnDemand).unwrap(),
            "\"ISSUANCE_ON_DEMAND\""
        );
        assert_eq!(
            "by_default".parse::<IssuanceMode>().unwrap(),
            IssuanceMode::ByDefault
        );
        assert!("sometimes".parse::<IssuanceMode>().is_err());
    }

    #[test]
    fn test_predicate_types() {
        assert_eq!(serde_json::to_string(&PredicateType::GE).unwrap(), "\">=\"");
        assert!(PredicateType::GE.holds(18, 18));
        assert!(!PredicateType::GT.holds(18, 18));
        assert!(PredicateType::LE.holds(17, 18));
        assert!(PredicateType::LT.holds(17, 18));
    }

    #[test]
    fn test_delta_unstamped_keeps_sets() {
        let delta = RevocationRegistryDelta {
            registry_id: RevRegId::new("rr"),
            issued: [1, 2].into_iter().collect(),
            revoked: [3].into_iter().collect(),
            prior_accumulator: None,
            new_accumulator: Accumulator::from_bytes(vec![9]),
            valid_from: None,
            valid_to: Some(Timestamp(100)),
        };
        assert!(delta.is_genesis());
        assert!(delta.is_published());
        let raw = delta.unstamped();
        assert!(!raw.is_published());
        assert_eq!(raw.touched().len(), 3);
        let json = serde_json::to_value(&raw).unwrap();
        assert!(json.get("valid_to").is_none());
        assert!(json["prior_accumulator"].is_null());
    }

    #[test]
    fn test_filter_skips_unset_fields() {
        let filter = Filter {
            cred_def_id: Some(CredDefId::new("cd")),
            ..Default::default()
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json, serde_json::json!({"cred_def_id": "cd"}));
    }
}
