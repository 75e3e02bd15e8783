//! Prover-side credential handling: master secrets, credential requests,
//! credential storage and the revocation state cache.

use crate::engine::ProofEngine;
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::filter;
use crate::status::{transition, IssuanceStatus};
use crate::types::*;
use credex_core::{hash_parts, verify_encoding, CredentialId, IssuerDid, Nonce, Timestamp};
use credex_vault::Wallet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MASTER_SECRET: &str = "master_secret";
const REQUEST: &str = "cred_request";
const CREDENTIAL: &str = "credential";
const REV_STATE: &str = "rev_state";

/// Prover's record of one outstanding request, keyed by request nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RequestRecord {
    status: IssuanceStatus,
    credential_id: Option<CredentialId>,
}

fn info_of(id: &CredentialId, credential: &Credential) -> CredentialInfo {
    CredentialInfo {
        referent: id.clone(),
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

/// Cache key ordering states of one credential by time.
fn rev_state_key(credential_id: &CredentialId, timestamp: Timestamp) -> String {
    format!("{}@{:020}", credential_id, timestamp.as_secs())
}

pub struct Holder {
    engine: Arc<dyn ProofEngine>,
    wallet: Wallet,
}

impl Holder {
    pub fn new(engine: Arc<dyn ProofEngine>, wallet: Wallet) -> Self {
        Self { engine, wallet }
    }

    /// `AlreadyExists` if the name is taken.
    pub fn create_master_secret(&self, name: &str) -> CredResult<()> {
        if name.trim().is_empty() {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("empty master secret name".into()),
                "master secret needs a name",
            ));
        }
        let secret = self.engine.new_master_secret()?;
        self.wallet.add_object(MASTER_SECRET, name, &secret)?;
        tracing::info!(name, "master secret created");
        Ok(())
    }

    pub fn master_secret(&self, name: &str) -> CredResult<MasterSecret> {
        Ok(self.wallet.get_object(MASTER_SECRET, name)?)
    }

    /// Answer an offer. The master secret is blinded; only the prover keeps
    /// the metadata that opens it.
    pub fn create_request(
        &self,
        prover_did: Option<&IssuerDid>,
        offer: &CredentialOffer,
        cred_def: &CredentialDefinition,
        master_secret_name: &str,
    ) -> CredResult<(CredentialRequest, CredentialRequestMetadata)> {
        tracing::debug!(cred_def_id = %cred_def.id, "creating credential request");
        if offer.cred_def_id != cred_def.id || offer.schema_id != cred_def.schema_id {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("offer does not match credential definition".into()),
                "offer mismatch",
            ));
        }
        if !offer.nonce.is_well_formed() {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("malformed offer nonce".into()),
                "offer nonce must be decimal",
            ));
        }
        let master_secret = self.master_secret(master_secret_name)?;
        let (blinded_ms, blinding) = self.engine.blind_master_secret(&master_secret)?;

        let nonce = Nonce::generate();
        let request = CredentialRequest {
            prover_did: prover_did.cloned(),
            cred_def_id: cred_def.id.clone(),
            blinded_ms,
            offer_nonce: offer.nonce.clone(),
            nonce: nonce.clone(),
        };
        let metadata = CredentialRequestMetadata {
            master_secret_name: master_secret_name.to_string(),
            blinding,
            nonce: nonce.clone(),
            cred_def_id: cred_def.id.clone(),
        };
        let record = RequestRecord {
            status: IssuanceStatus::RequestReceived,
            credential_id: None,
        };
        self.wallet.add_object(REQUEST, nonce.as_str(), &record)?;
        Ok((request, metadata))
    }

    /// Check and keep a received credential. Returns its id in the wallet.
    pub fn store_credential(
        &self,
        credential_id: Option<CredentialId>,
        metadata: &CredentialRequestMetadata,
        credential: &Credential,
        cred_def: &CredentialDefinition,
    ) -> CredResult<CredentialId> {
        tracing::debug!(cred_def_id = %credential.cred_def_id, "storing credential");
        let mut record: RequestRecord = self
            .wallet
            .get_opt_object(REQUEST, metadata.nonce.as_str())?
            .ok_or_else(|| {
                CredErrorDetail::new(
                    CredError::InvalidRequest("credential answers no request of this wallet".into()),
                    "unknown request",
                )
            })?;
        if credential.cred_def_id != metadata.cred_def_id || credential.cred_def_id != cred_def.id {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("credential from another definition".into()),
                "credential definition mismatch",
            ));
        }
        if let Some((name, _)) = credential
            .values
            .iter()
            .find(|(_, v)| !verify_encoding(&v.raw, &v.encoded))
        {
            return Err(CredErrorDetail::new(
                CredError::CredentialValuesMismatch(format!("{} is not encoded from its raw value", name)),
                "attribute encoding mismatch",
            ));
        }
        if credential.rev_reg_id.is_some() != credential.rev_reg_index.is_some() {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("revocation id without index".into()),
                "malformed credential",
            ));
        }

        record.status = transition(record.status, IssuanceStatus::Issued)?;

        let master_secret = self.master_secret(&metadata.master_secret_name)?;
        let signature =
            self.engine
                .process_signature(credential, cred_def, &master_secret, &metadata.blinding)?;
        let stored = Credential {
            signature,
            ..credential.clone()
        };

        let id = credential_id.unwrap_or_else(|| {
            let digest = hash_parts(&[
                b"credential-id",
                credential.cred_def_id.as_str().as_bytes(),
                metadata.nonce.as_str().as_bytes(),
            ]);
            CredentialId::new(hex::encode(&digest.as_bytes()[..16]))
        });
        self.wallet.add_object(CREDENTIAL, id.as_str(), &stored)?;

        record.status = transition(record.status, IssuanceStatus::Stored)?;
        record.credential_id = Some(id.clone());
        self.wallet.put_object(REQUEST, metadata.nonce.as_str(), &record)?;
        tracing::info!(credential_id = %id, cred_def_id = %stored.cred_def_id, "credential stored");
        Ok(id)
    }

    pub fn credential(&self, id: &CredentialId) -> CredResult<Credential> {
        self.wallet
            .get_opt_object(CREDENTIAL, id.as_str())?
            .ok_or_else(|| {
                CredErrorDetail::new(CredError::NotFound(format!("credential {}", id)), "no such credential")
                    .with_credential_id(id.as_str())
            })
    }

    pub fn get_credential(&self, id: &CredentialId) -> CredResult<CredentialInfo> {
        let credential = self.credential(id)?;
        Ok(info_of(id, &credential))
    }

    /// Stored credentials matching `filter`.
    pub fn get_credentials(&self, filter: &Filter) -> CredResult<Vec<CredentialInfo>> {
        let all: Vec<(String, Credential)> = self.wallet.list_objects(CREDENTIAL)?;
        Ok(all
            .iter()
            .map(|(id, c)| info_of(&CredentialId::new(id.as_str()), c))
            .filter(|info| filter::matches(filter, info))
            .collect())
    }

    /// Every stored credential.
    pub fn credentials(&self) -> CredResult<Vec<CredentialInfo>> {
        self.get_credentials(&Filter::default())
    }

    pub fn request_status(&self, request_nonce: &Nonce) -> CredResult<IssuanceStatus> {
        let record: RequestRecord = self.wallet.get_object(REQUEST, request_nonce.as_str())?;
        Ok(record.status)
    }

    pub fn delete_credential(&self, id: &CredentialId) -> CredResult<bool> {
        Ok(self.wallet.delete_object(CREDENTIAL, id.as_str())?)
    }

    /// Cache a revocation state for later presentations.
    pub fn store_revocation_state(
        &self,
        credential_id: &CredentialId,
        state: &RevocationState,
    ) -> CredResult<()> {
        self.wallet.put_object(
            REV_STATE,
            &rev_state_key(credential_id, state.timestamp),
            state,
        )?;
        Ok(())
    }

    pub fn revocation_state(
        &self,
        credential_id: &CredentialId,
        timestamp: Timestamp,
    ) -> CredResult<Option<RevocationState>> {
        Ok(self
            .wallet
            .get_opt_object(REV_STATE, &rev_state_key(credential_id, timestamp))?)
    }

    /// Latest cached state of a credential no later than `at`; the starting
    /// point for an incremental witness update.
    pub fn latest_revocation_state(
        &self,
        credential_id: &CredentialId,
        at: Timestamp,
    ) -> CredResult<Option<RevocationState>> {
        let prefix = format!("{}@", credential_id);
        let states: Vec<(String, RevocationState)> = self.wallet.list_objects(REV_STATE)?;
        Ok(states
            .into_iter()
            .filter(|(key, state)| key.starts_with(&prefix) && state.timestamp <= at)
            .map(|(_, state)| state)
            .last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedProofEngine;
    use credex_vault::InMemoryStore;

    fn holder() -> Holder {
        let wallet = Wallet::new("prover", Arc::new(InMemoryStore::new()));
        Holder::new(Arc::new(SimulatedProofEngine), wallet)
    }

    #[test]
    fn test_master_secret_names_are_unique() {
        let h = holder();
        h.create_master_secret("main").unwrap();
        let err = h.create_master_secret("main").unwrap_err();
        assert!(matches!(err.kind, CredError::AlreadyExists(_)));
        assert!(h.create_master_secret(" ").is_err());
        assert!(h.master_secret("main").is_ok());
        assert!(matches!(
            h.master_secret("other").unwrap_err().kind,
            CredError::NotFound(_)
        ));
    }

    #[test]
    fn test_master_secret_debug_is_redacted() {
        let h = holder();
        h.create_master_secret("main").unwrap();
        let ms = h.master_secret("main").unwrap();
        assert_eq!(format!("{:?}", ms), "MasterSecret(<redacted>)");
    }

    #[test]
    fn test_unknown_credential() {
        let h = holder();
        let err = h.get_credential(&CredentialId::new("missing")).unwrap_err();
        assert!(matches!(err.kind, CredError::NotFound(_)));
        assert_eq!(err.credential_id.as_deref(), Some("missing"));
        assert!(h.credentials().unwrap().is_empty());
    }

    #[test]
    fn test_rev_state_keys_sort_by_time() {
        let id = CredentialId::new("c");
        assert!(rev_state_key(&id, Timestamp(9)) < rev_state_key(&id, Timestamp(10)));
    }
}
