use crate::error::{CredexError, CredexResult};
use crate::types::{CredDefId, Digest32, IssuerDid, RevRegId, SchemaId};
use sha2::{Digest, Sha256};

/// Derive a DID from an Ed25519 verification key.
///
/// Formula: Base58(verkey[0:16])
pub fn did_from_verkey(verkey: &[u8; 32]) -> IssuerDid {
    IssuerDid(bs58::encode(&verkey[..16]).into_string())
}

/// A DID must decode to 16 bytes (abbreviated) or 32 bytes (full verkey).
pub fn validate_did(did: &IssuerDid) -> CredexResult<()> {
    let decoded = bs58::decode(did.as_str())
        .into_vec()
        .map_err(|_| CredexError::InvalidInput(format!("malformed did: {}", did)))?;
    match decoded.len() {
        16 | 32 => Ok(()),
        n => Err(CredexError::InvalidInput(format!(
            "did must decode to 16 or 32 bytes, got {}",
            n
        ))),
    }
}

/// Hash an ordered list of byte strings. Each part is length-prefixed so
/// that ("ab", "c") and ("a", "bc") never collide.
pub fn hash_parts(parts: &[&[u8]]) -> Digest32 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    Digest32(hasher.finalize().into())
}

// ---------------------------------------------------------------------------
// Ledger identifiers
// ---------------------------------------------------------------------------

const SCHEMA_MARKER: &str = "2";
const CRED_DEF_MARKER: &str = "3";
const REV_REG_MARKER: &str = "4";
pub const SIGNATURE_TYPE: &str = "CL";
pub const REGISTRY_TYPE: &str = "CL_ACCUM";

pub fn build_schema_id(did: &IssuerDid, name: &str, version: &str) -> SchemaId {
    SchemaId(format!("{}:{}:{}:{}", did, SCHEMA_MARKER, name, version))
}

pub fn build_cred_def_id(did: &IssuerDid, schema_id: &SchemaId, tag: &str) -> CredDefId {
    CredDefId(format!(
        "{}:{}:{}:{}:{}",
        did, CRED_DEF_MARKER, SIGNATURE_TYPE, schema_id, tag
    ))
}

pub fn build_rev_reg_id(did: &IssuerDid, cred_def_id: &CredDefId, tag: &str) -> RevRegId {
    RevRegId(format!(
        "{}:{}:{}:{}:{}",
        did, REV_REG_MARKER, cred_def_id, REGISTRY_TYPE, tag
    ))
}

/// Parts of a schema id: (issuer did, name, version).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIdParts {
    pub issuer_did: IssuerDid,
    pub name: String,
    pub version: String,
}

pub fn parse_schema_id(id: &SchemaId) -> CredexResult<SchemaIdParts> {
    let parts: Vec<&str> = id.as_str().split(':').collect();
    match parts.as_slice() {
        [did, SCHEMA_MARKER, name, version] if !did.is_empty() => Ok(SchemaIdParts {
            issuer_did: IssuerDid::new(*did),
            name: name.to_string(),
            version: version.to_string(),
        }),
        _ => Err(CredexError::InvalidInput(format!("malformed schema id: {}", id))),
    }
}

/// Issuer DID embedded in a credential definition id.
pub fn issuer_of_cred_def(id: &CredDefId) -> CredexResult<IssuerDid> {
    let parts: Vec<&str> = id.as_str().split(':').collect();
    if parts.len() >= 5 && parts[1] == CRED_DEF_MARKER && parts[2] == SIGNATURE_TYPE {
        Ok(IssuerDid::new(parts[0]))
    } else {
        Err(CredexError::InvalidInput(format!(
            "malformed credential definition id: {}",
            id
        )))
    }
}

// ---------------------------------------------------------------------------
// Attribute encoding
// ---------------------------------------------------------------------------

/// Encode a raw attribute value.
///
/// Values that parse as a 32-bit signed integer encode as themselves. Any
/// other value encodes as the decimal form of its SHA-256 digest.
pub fn encode_attribute(raw: &str) -> String {
    match raw.parse::<i32>() {
        Ok(n) => n.to_string(),
        Err(_) => decimal_from_be_bytes(&Sha256::digest(raw.as_bytes())),
    }
}

pub fn verify_encoding(raw: &str, encoded: &str) -> bool {
    encode_attribute(raw) == encoded
}

/// Canonical form of an attribute name: lowercase with whitespace removed.
pub fn attr_common_view(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn decimal_from_be_bytes(bytes: &[u8]) -> String {
    let mut num: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if num.is_empty() {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while !num.is_empty() {
        let mut remainder: u32 = 0;
        let mut quotient = Vec::with_capacity(num.len());
        for byte in &num {
            let acc = (remainder << 8) | u32::from(*byte);
            let q = (acc / 10) as u8;
            remainder = acc % 10;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q);
            }
        }
        digits.push(b'0' + remainder as u8);
        num = quotient;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
