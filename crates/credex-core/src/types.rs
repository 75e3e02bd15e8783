use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Timestamp: ledger time in whole seconds since the Unix epoch
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self(seconds)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn plus(&self, seconds: u64) -> Self {
        Self(self.0.saturating_add(seconds))
    }

    pub fn to_rfc3339(&self) -> String {
        let dt = chrono::DateTime::from_timestamp(self.0 as i64, 0);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt.timestamp().max(0) as u64)
    }
}

// ---------------------------------------------------------------------------
// Nonce: 80-bit random value carried as a decimal string on the wire
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub String);

impl Nonce {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes[6..]);
        Self(u128::from_be_bytes(bytes).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A nonce is a non-empty run of decimal digits.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers: prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(IssuerDid, "Decentralized identifier of a publishing party.");
define_id!(SchemaId, "Ledger identifier of a schema.");
define_id!(CredDefId, "Ledger identifier of a credential definition.");
define_id!(RevRegId, "Ledger identifier of a revocation registry.");
define_id!(CredentialId, "Wallet-local identifier of a stored credential.");
define_id!(Referent, "Key of a requested attribute or predicate.");
define_id!(StoreKey, "Key of a record in a party's secure store.");
define_id!(MasterSecretId, "Name of a prover master secret.");

// ---------------------------------------------------------------------------
// SeqNo: ledger transaction sequence number
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeqNo(pub u64);

impl SeqNo {
    pub fn initial() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LedgerObjectType: kinds of transactions the ledger accepts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LedgerObjectType {
    #[serde(rename = "SCHEMA")]
    Schema,
    #[serde(rename = "CRED_DEF")]
    CredentialDefinition,
    #[serde(rename = "REVOC_REG_DEF")]
    RevocationRegistryDefinition,
    #[serde(rename = "REVOC_REG_ENTRY")]
    RevocationRegistryEntry,
}

impl LedgerObjectType {
    /// Immutable objects are written once; registry entries accumulate.
    pub fn is_immutable(&self) -> bool {
        !matches!(self, LedgerObjectType::RevocationRegistryEntry)
    }
}

impl fmt::Display for LedgerObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerObjectType::Schema => write!(f, "SCHEMA"),
            LedgerObjectType::CredentialDefinition => write!(f, "CRED_DEF"),
            LedgerObjectType::RevocationRegistryDefinition => write!(f, "REVOC_REG_DEF"),
            LedgerObjectType::RevocationRegistryEntry => write!(f, "REVOC_REG_ENTRY"),
        }
    }
}

// ---------------------------------------------------------------------------
// Digest32: 32-byte hash value, hex on the wire
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest32(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl Digest32 {
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn xor(&self, other: &Digest32) -> Digest32 {
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        Digest32(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Hex serialization helper for fixed-size byte arrays
// ---------------------------------------------------------------------------

pub mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_seconds(100);
        let t2 = Timestamp::from_seconds(200);
        assert!(t1 < t2);
        assert_eq!(t1.plus(100), t2);
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let t = Timestamp::from_seconds(1_700_000_000);
        assert!(t.to_rfc3339().contains("2023"));
    }

    #[test]
    fn test_timestamp_serializes_as_number() {
        let json = serde_json::to_string(&Timestamp(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_nonce_generation() {
        let n1 = Nonce::generate();
        let n2 = Nonce::generate();
        assert_ne!(n1, n2);
        assert!(n1.is_well_formed());
        assert!(!Nonce("12a".into()).is_well_formed());
        assert!(!Nonce(String::new()).is_well_formed());
    }

    #[test]
    fn test_nonce_fits_80_bits() {
        for _ in 0..32 {
            let n: u128 = Nonce::generate().as_str().parse().unwrap();
            assert!(n < (1u128 << 80));
        }
    }

    #[test]
    fn test_typed_ids_are_transparent() {
        let id = SchemaId::new("did:2:gvt:1.0");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"did:2:gvt:1.0\"");
        assert_eq!(id.to_string(), "did:2:gvt:1.0");
    }

    #[test]
    fn test_seq_no() {
        let s = SeqNo::initial();
        assert_eq!(s.next().0, 2);
    }

    #[test]
    fn test_object_type_wire_names() {
        let json = serde_json::to_string(&LedgerObjectType::RevocationRegistryEntry).unwrap();
        assert_eq!(json, "\"REVOC_REG_ENTRY\"");
        assert!(LedgerObjectType::Schema.is_immutable());
        assert!(!LedgerObjectType::RevocationRegistryEntry.is_immutable());
    }

    #[test]
    fn test_digest_xor_is_involutive() {
        let a = Digest32([0x0f; 32]);
        let b = Digest32([0xf1; 32]);
        assert_eq!(a.xor(&b).xor(&b), a);
        assert_eq!(a.xor(&a), Digest32::zero());
    }

    #[test]
    fn test_digest_serde() {
        let d = Digest32([0xab; 32]);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.starts_with("\"abab"));
        let d2: Digest32 = serde_json::from_str(&json).unwrap();
        assert_eq!(d, d2);
    }
}
