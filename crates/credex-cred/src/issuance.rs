//! Issuance Coordinator (issuer side).
//!
//! Every offer is recorded under its nonce. The first request answering it
//! moves the record to `RequestReceived` and binds the request nonce; any
//! other request for the same offer is a replay. A retry of the bound
//! request reuses the reserved index, and once issued it gets the stored
//! result back instead of a second credential.

use crate::definition::{CRED_DEF, CRED_DEF_KEY, REV_REG_DEF, REV_REG_STATE, SCHEMA};
use crate::engine::ProofEngine;
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::ledger;
use crate::registry::IssuerRegistryState;
use crate::revocation;
use crate::status::{transition, IssuanceStatus};
use crate::types::*;
use credex_core::{CredDefId, LedgerClient, Nonce, RevRegId, SeqNo};
use credex_vault::Wallet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

const OFFER: &str = "offer";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OfferRecord {
    offer: CredentialOffer,
    status: IssuanceStatus,
    request_nonce: Option<Nonce>,
    issued: Option<(Credential, Option<RevocationRegistryDelta>)>,
}

pub struct IssuanceCoordinator {
    engine: Arc<dyn ProofEngine>,
    wallet: Wallet,
    /// Serializes read-modify-write of registry handles.
    registry_lock: Mutex<()>,
}

impl IssuanceCoordinator {
    pub fn new(engine: Arc<dyn ProofEngine>, wallet: Wallet) -> Self {
        Self {
            engine,
            wallet,
            registry_lock: Mutex::new(()),
        }
    }

    fn lock_registries(&self) -> CredResult<std::sync::MutexGuard<'_, ()>> {
        self.registry_lock
            .lock()
            .map_err(|_| CredErrorDetail::new(CredError::InternalError, "registry lock poisoned"))
    }

    fn registry_state(&self, id: &RevRegId) -> CredResult<IssuerRegistryState> {
        Ok(self.wallet.get_object(REV_REG_STATE, id.as_str())?)
    }

    fn save_registry_state(&self, state: &IssuerRegistryState) -> CredResult<()> {
        Ok(self
            .wallet
            .put_object(REV_REG_STATE, state.registry_id.as_str(), state)?)
    }

    pub fn create_offer(&self, cred_def_id: &CredDefId) -> CredResult<CredentialOffer> {
        let cred_def: CredentialDefinition = self.wallet.get_object(CRED_DEF, cred_def_id.as_str())?;
        let offer = CredentialOffer {
            schema_id: cred_def.schema_id,
            cred_def_id: cred_def_id.clone(),
            nonce: Nonce::generate(),
        };
        let record = OfferRecord {
            offer: offer.clone(),
            status: IssuanceStatus::OfferCreated,
            request_nonce: None,
            issued: None,
        };
        self.wallet.add_object(OFFER, offer.nonce.as_str(), &record)?;
        tracing::info!(%cred_def_id, nonce = %offer.nonce, "credential offer created");
        Ok(offer)
    }

    /// Bind `request` to its offer, or recognize a retry of it.
    fn accept_request(&self, request: &CredentialRequest) -> CredResult<OfferRecord> {
        let mut record: OfferRecord = self
            .wallet
            .get_opt_object(OFFER, request.offer_nonce.as_str())?
            .ok_or_else(|| {
                CredErrorDetail::new(
                    CredError::InvalidRequest("request answers no known offer".into()),
                    "unknown offer nonce",
                )
            })?;
        if record.offer.cred_def_id != request.cred_def_id {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("request names another credential definition".into()),
                "credential definition mismatch",
            ));
        }
        if record.status == IssuanceStatus::OfferCreated {
            record.status = transition(record.status, IssuanceStatus::RequestReceived)?;
            record.request_nonce = Some(request.nonce.clone());
            self.wallet
                .put_object(OFFER, request.offer_nonce.as_str(), &record)?;
            return Ok(record);
        }
        if record.request_nonce.as_ref() == Some(&request.nonce) {
            return Ok(record);
        }
        tracing::warn!(offer_nonce = %request.offer_nonce, "offer replayed");
        Err(CredError::OfferReplayed.into())
    }

    /// Sign a credential for `request`. With a registry, reserves an index
    /// and returns the delta that must be published for the credential to be
    /// provably non-revoked (none under `ByDefault`).
    pub fn issue(
        &self,
        request: &CredentialRequest,
        raw_values: &BTreeMap<String, String>,
        rev_reg_id: Option<&RevRegId>,
    ) -> CredResult<(Credential, Option<RevocationRegistryDelta>)> {
        tracing::debug!(cred_def_id = %request.cred_def_id, rev_reg_id = ?rev_reg_id, "issuing credential");
        if !request.nonce.is_well_formed() || !request.offer_nonce.is_well_formed() {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("malformed nonce".into()),
                "request nonces must be decimal",
            ));
        }

        let mut record = self.accept_request(request)?;
        if let Some(done) = record.issued.clone() {
            tracing::debug!(nonce = %request.nonce, "returning credential already issued for request");
            return Ok(done);
        }

        let cred_def: CredentialDefinition =
            self.wallet.get_object(CRED_DEF, request.cred_def_id.as_str())?;
        let private_key: CredentialPrivateKey =
            self.wallet.get_object(CRED_DEF_KEY, request.cred_def_id.as_str())?;
        let schema: Schema = self.wallet.get_object(SCHEMA, cred_def.schema_id.as_str())?;

        let supplied: BTreeSet<&str> = raw_values.keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> = schema.attr_names.iter().map(String::as_str).collect();
        if supplied != expected {
            return Err(CredErrorDetail::new(
                CredError::CredentialValuesMismatch(format!(
                    "expected {:?}, got {:?}",
                    expected, supplied
                )),
                "attribute values do not match the schema",
            ));
        }
        let values = encode_values(raw_values.iter().map(|(k, v)| (k.clone(), v.clone())));

        let (credential, delta) = match rev_reg_id {
            None if cred_def.supports_revocation => {
                return Err(CredErrorDetail::new(
                    CredError::InvalidRequest("a revocation registry is required".into()),
                    "credential definition supports revocation",
                ));
            }
            None => {
                let signature =
                    self.engine
                        .sign(&cred_def, &private_key, &request.blinded_ms, &values, None)?;
                let credential = Credential {
                    schema_id: cred_def.schema_id.clone(),
                    cred_def_id: cred_def.id.clone(),
                    rev_reg_id: None,
                    rev_reg_index: None,
                    values,
                    signature,
                };
                (credential, None)
            }
            Some(id) => {
                if !cred_def.supports_revocation {
                    return Err(CredErrorDetail::new(
                        CredError::RevocationNotSupported(cred_def.id.to_string()),
                        "credential definition does not support revocation",
                    ));
                }
                let def: RevocationRegistryDefinition =
                    self.wallet.get_object(REV_REG_DEF, id.as_str())?;
                if def.cred_def_id != cred_def.id {
                    return Err(CredErrorDetail::new(
                        CredError::InvalidRequest("registry belongs to another definition".into()),
                        "registry mismatch",
                    ));
                }

                let _guard = self.lock_registries()?;
                let mut state = self.registry_state(id)?;
                let index = state.reserve(&request.nonce)?;
                // Persist the reservation before anything can fail.
                self.save_registry_state(&state)?;

                let signature = self.engine.sign(
                    &cred_def,
                    &private_key,
                    &request.blinded_ms,
                    &values,
                    Some(index),
                )?;
                let delta = match def.issuance_mode {
                    IssuanceMode::OnDemand => Some(revocation::issuance_delta(
                        self.engine.as_ref(),
                        id,
                        &state.accumulator,
                        index,
                    )?),
                    IssuanceMode::ByDefault => None,
                };
                state.commit_issue(&request.nonce, index, delta.as_ref());
                self.save_registry_state(&state)?;

                let credential = Credential {
                    schema_id: cred_def.schema_id.clone(),
                    cred_def_id: cred_def.id.clone(),
                    rev_reg_id: Some(id.clone()),
                    rev_reg_index: Some(index),
                    values,
                    signature,
                };
                (credential, delta)
            }
        };

        record.status = transition(record.status, IssuanceStatus::Issued)?;
        record.issued = Some((credential.clone(), delta.clone()));
        self.wallet
            .put_object(OFFER, request.offer_nonce.as_str(), &record)?;
        tracing::info!(
            cred_def_id = %credential.cred_def_id,
            rev_reg_id = ?credential.rev_reg_id,
            index = ?credential.rev_reg_index,
            "credential issued"
        );
        Ok((credential, delta))
    }

    /// Flip `index` to revoked. Valid once per index. The handle is updated
    /// before the caller publishes; if that publish fails, `sync_registry`
    /// restores the ledger's view. `revoke_and_publish` avoids the gap.
    pub fn revoke(&self, registry_id: &RevRegId, index: u32) -> CredResult<RevocationRegistryDelta> {
        let _guard = self.lock_registries()?;
        let mut state = self.registry_state(registry_id)?;
        state.check_revocable(index)?;
        let delta =
            revocation::revocation_delta(self.engine.as_ref(), registry_id, &state.accumulator, index)?;
        state.apply(&delta);
        self.save_registry_state(&state)?;
        tracing::info!(%registry_id, index, "credential revoked");
        Ok(delta)
    }

    /// Revoke `indices` as one ledger entry. The local handle changes only
    /// once the ledger has accepted the delta, so a failed publish leaves
    /// nothing behind and the same call can simply be retried.
    pub fn revoke_and_publish(
        &self,
        ledger: &dyn LedgerClient,
        registry_id: &RevRegId,
        indices: &BTreeSet<u32>,
    ) -> CredResult<(RevocationRegistryDelta, SeqNo)> {
        if indices.is_empty() {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("no indices to revoke".into()),
                "empty revocation",
            ));
        }
        let _guard = self.lock_registries()?;
        let mut state = self.registry_state(registry_id)?;
        for index in indices {
            state.check_revocable(*index)?;
        }
        let delta = revocation::batch_revocation_delta(
            self.engine.as_ref(),
            registry_id,
            &state.accumulator,
            indices,
        )?;
        let seq_no = ledger::publish_delta(ledger, &delta)?;
        state.apply(&delta);
        self.save_registry_state(&state)?;
        tracing::info!(%registry_id, ?indices, %seq_no, "credentials revoked");
        Ok((delta, seq_no))
    }

    /// Free the index held for an abandoned request.
    pub fn release_reservation(&self, registry_id: &RevRegId, request_nonce: &Nonce) -> CredResult<Option<u32>> {
        let _guard = self.lock_registries()?;
        let mut state = self.registry_state(registry_id)?;
        let released = state.release_reservation(request_nonce);
        self.save_registry_state(&state)?;
        if let Some(index) = released {
            tracing::info!(%registry_id, index, "reservation released");
        }
        Ok(released)
    }

    /// Reconcile the local handle with what the ledger has published.
    pub fn sync_registry(&self, ledger: &dyn LedgerClient, registry_id: &RevRegId) -> CredResult<()> {
        let until = ledger::latest_entry_time(ledger, registry_id)?;
        let composed = ledger::read_delta(ledger, self.engine.as_ref(), registry_id, None, until)?
            .ok_or_else(|| {
                CredErrorDetail::new(
                    CredError::NotFound(format!("registry {}", registry_id)),
                    "registry has no published entries",
                )
            })?;
        let _guard = self.lock_registries()?;
        let mut state = self.registry_state(registry_id)?;
        state.sync_from_ledger(&composed);
        self.save_registry_state(&state)?;
        tracing::info!(%registry_id, as_of = %until, "registry handle synced from ledger");
        Ok(())
    }

    pub fn registry(&self, registry_id: &RevRegId) -> CredResult<IssuerRegistryState> {
        self.registry_state(registry_id)
    }

    pub fn offer_status(&self, offer_nonce: &Nonce) -> CredResult<IssuanceStatus> {
        let record: OfferRecord = self.wallet.get_object(OFFER, offer_nonce.as_str())?;
        Ok(record.status)
    }
}
