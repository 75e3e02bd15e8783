use crate::error::{VaultError, VaultResult};
use credex_core::{did_from_verkey, IssuerDid};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Long-lived identity key of a party. Its DID is what the ledger sees as
/// the issuer of schemas and credential definitions.
pub struct PartyKey {
    seed: Zeroizing<[u8; 32]>,
    verkey: [u8; 32],
}

/// Wallet form of a party key. Only ever written to the owner's own store.
#[derive(Serialize, Deserialize)]
pub struct PartyKeyRecord {
    pub did: IssuerDid,
    pub verkey: String,
    seed: Zeroizing<String>,
}

impl PartyKey {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::from_seed(signing_key.to_bytes())
    }

    /// Create a key from a fixed seed (for testing).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self {
            seed: Zeroizing::new(seed),
            verkey: signing_key.verifying_key().to_bytes(),
        }
    }

    pub fn did(&self) -> IssuerDid {
        did_from_verkey(&self.verkey)
    }

    pub fn verkey(&self) -> String {
        bs58::encode(self.verkey).into_string()
    }

    pub fn to_record(&self) -> PartyKeyRecord {
        PartyKeyRecord {
            did: self.did(),
            verkey: self.verkey(),
            seed: Zeroizing::new(bs58::encode(self.seed.as_ref()).into_string()),
        }
    }

    pub fn from_record(record: &PartyKeyRecord) -> VaultResult<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(record.seed.as_str())
                .into_vec()
                .map_err(|_| VaultError::Key("malformed stored seed".into()))?,
        );
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::Key("stored seed must be 32 bytes".into()))?;
        let key = Self::from_seed(seed);
        if key.did() != record.did {
            return Err(VaultError::Key("stored did does not match its key".into()));
        }
        Ok(key)
    }
}

impl std::fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PartyKey({})", self.did())
    }
}
