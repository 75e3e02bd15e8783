//! Party façades over the credential and presentation layers.
//!
//! Each agent owns its party's wallet and reads the shared ledger. Nothing
//! passes between agents except the protocol messages themselves.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use credex_core::{
    CredDefId, CredentialId, IssuerDid, LedgerClient, RevRegId, SeqNo, Timestamp,
};
use credex_cred::ledger::{
    publish_cred_def, publish_delta, publish_registry, publish_schema, read_cred_def,
    read_delta_chain_after, read_registry_state, read_rev_reg_def, read_schema,
};
use credex_cred::{
    build_witness, update_witness, CredError, CredErrorDetail, CredResult,
    Credential, CredentialDefinition, CredentialInfo, CredentialOffer, CredentialRequest,
    CredentialRequestMetadata, DefinitionManager, Holder, IssuanceCoordinator, IssuanceMode,
    IssuerRegistryState, ProofEngine, RevocationRegistryDefinition, RevocationRegistryDelta,
    RevocationState, Schema,
};
use credex_proof::{
    create_proof, find_credentials, CredentialsForRequest, Proof, ProofRequest, ProverObjects,
    RequestedCredentials, VerifierObjects,
};
use credex_vault::{PartyKey, PartyKeyRecord, Wallet};

use crate::config::RegistryConfig;
use crate::error::{RootError, RootResult};

const PARTY_KEY: &str = "party_key";

/// The party's DID key, created on first use.
fn load_or_create_key(wallet: &Wallet) -> RootResult<PartyKey> {
    if let Some(record) = wallet.get_opt_object::<PartyKeyRecord>(PARTY_KEY, "default")? {
        return Ok(PartyKey::from_record(&record)?);
    }
    let key = PartyKey::generate();
    wallet.add_object(PARTY_KEY, "default", &key.to_record())?;
    tracing::info!(party = wallet.party(), did = %key.did(), "party key created");
    Ok(key)
}

// ---------------------------------------------------------------------------
// IssuerAgent
// ---------------------------------------------------------------------------

pub struct IssuerAgent {
    did: IssuerDid,
    ledger: Arc<dyn LedgerClient>,
    definitions: DefinitionManager,
    coordinator: IssuanceCoordinator,
    registry_defaults: RegistryConfig,
}

impl IssuerAgent {
    pub fn new(
        engine: Arc<dyn ProofEngine>,
        ledger: Arc<dyn LedgerClient>,
        wallet: Wallet,
        registry_defaults: RegistryConfig,
        max_attributes: usize,
    ) -> RootResult<Self> {
        let key = load_or_create_key(&wallet)?;
        Ok(Self {
            did: key.did(),
            ledger,
            definitions: DefinitionManager::new(engine.clone(), wallet.clone())
                .with_max_attributes(max_attributes),
            coordinator: IssuanceCoordinator::new(engine, wallet),
            registry_defaults,
        })
    }

    pub fn did(&self) -> &IssuerDid {
        &self.did
    }

    /// Create and publish a schema.
    pub fn publish_schema(&self, name: &str, version: &str, attr_names: &[String]) -> RootResult<Schema> {
        let schema = self
            .definitions
            .create_schema(&self.did, name, version, attr_names)?;
        let seq_no = publish_schema(self.ledger.as_ref(), &schema)?;
        tracing::info!(schema_id = %schema.id, %seq_no, "schema published");
        Ok(schema)
    }

    pub fn publish_credential_definition(
        &self,
        schema: &Schema,
        tag: &str,
        supports_revocation: bool,
    ) -> RootResult<CredentialDefinition> {
        let cred_def = self.definitions.create_credential_definition(
            &self.did,
            schema,
            tag,
            supports_revocation,
        )?;
        let seq_no = publish_cred_def(self.ledger.as_ref(), &cred_def)?;
        tracing::info!(cred_def_id = %cred_def.id, %seq_no, "credential definition published");
        Ok(cred_def)
    }

    /// Registry with the configured capacity and issuance mode.
    pub fn publish_registry(&self, cred_def_id: &CredDefId, tag: &str) -> RootResult<RevocationRegistryDefinition> {
        self.publish_registry_with(
            cred_def_id,
            tag,
            self.registry_defaults.max_credential_count,
            self.registry_defaults.issuance_mode,
        )
    }

    pub fn publish_registry_with(
        &self,
        cred_def_id: &CredDefId,
        tag: &str,
        max_credential_count: u32,
        issuance_mode: IssuanceMode,
    ) -> RootResult<RevocationRegistryDefinition> {
        let (def, genesis) = self.definitions.create_revocation_registry(
            cred_def_id,
            tag,
            max_credential_count,
            issuance_mode,
        )?;
        let seq_no = publish_registry(self.ledger.as_ref(), &def, &genesis)?;
        tracing::info!(registry_id = %def.id, %seq_no, "revocation registry published");
        Ok(def)
    }

    pub fn create_offer(&self, cred_def_id: &CredDefId) -> RootResult<CredentialOffer> {
        Ok(self.coordinator.create_offer(cred_def_id)?)
    }

    /// Issue a credential and publish the delta it produced, if any.
    pub fn issue(
        &self,
        request: &CredentialRequest,
        raw_values: &BTreeMap<String, String>,
        rev_reg_id: Option<&RevRegId>,
    ) -> RootResult<Credential> {
        let (credential, delta) = self.coordinator.issue(request, raw_values, rev_reg_id)?;
        if let Some(delta) = delta {
            self.publish(&delta)?;
        }
        Ok(credential)
    }

    /// Revoke one index and publish the delta. Nothing is recorded locally
    /// unless the publish succeeds, so a failed call can be retried as is.
    pub fn revoke(&self, registry_id: &RevRegId, index: u32) -> RootResult<SeqNo> {
        self.revoke_published(registry_id, &BTreeSet::from([index]))
    }

    /// Revoke several indices as a single ledger entry. Either every index
    /// is revoked and published or none is.
    pub fn revoke_batch(&self, registry_id: &RevRegId, indices: &BTreeSet<u32>) -> RootResult<Option<SeqNo>> {
        if indices.is_empty() {
            return Ok(None);
        }
        self.revoke_published(registry_id, indices).map(Some)
    }

    fn revoke_published(&self, registry_id: &RevRegId, indices: &BTreeSet<u32>) -> RootResult<SeqNo> {
        let (delta, seq_no) =
            self.coordinator
                .revoke_and_publish(self.ledger.as_ref(), registry_id, indices)?;
        tracing::info!(
            registry_id = %delta.registry_id,
            revoked = delta.revoked.len(),
            %seq_no,
            "delta published"
        );
        Ok(seq_no)
    }

    /// Catch the local registry handle up with the ledger, e.g. after another
    /// process published to the same registry.
    pub fn sync_registry(&self, registry_id: &RevRegId) -> RootResult<()> {
        Ok(self.coordinator.sync_registry(self.ledger.as_ref(), registry_id)?)
    }

    pub fn registry(&self, registry_id: &RevRegId) -> RootResult<IssuerRegistryState> {
        Ok(self.coordinator.registry(registry_id)?)
    }

    fn publish(&self, delta: &RevocationRegistryDelta) -> RootResult<SeqNo> {
        let seq_no = publish_delta(self.ledger.as_ref(), delta)?;
        tracing::info!(
            registry_id = %delta.registry_id,
            issued = delta.issued.len(),
            revoked = delta.revoked.len(),
            %seq_no,
            "delta published"
        );
        Ok(seq_no)
    }
}

// ---------------------------------------------------------------------------
// ProverAgent
// ---------------------------------------------------------------------------

pub struct ProverAgent {
    ledger: Arc<dyn LedgerClient>,
    engine: Arc<dyn ProofEngine>,
    holder: Holder,
    master_secret: String,
}

impl ProverAgent {
    /// Opens the prover's wallet, creating the named master secret if absent.
    pub fn new(
        engine: Arc<dyn ProofEngine>,
        ledger: Arc<dyn LedgerClient>,
        wallet: Wallet,
        master_secret: &str,
    ) -> RootResult<Self> {
        let holder = Holder::new(engine.clone(), wallet);
        match holder.create_master_secret(master_secret) {
            Ok(()) => {}
            Err(e) if matches!(e.kind, CredError::AlreadyExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            ledger,
            engine,
            holder,
            master_secret: master_secret.to_string(),
        })
    }

    pub fn holder(&self) -> &Holder {
        &self.holder
    }

    /// Answer an offer with a request for the definition it names.
    pub fn request_credential(
        &self,
        offer: &CredentialOffer,
    ) -> RootResult<(CredentialRequest, CredentialRequestMetadata)> {
        let cred_def = read_cred_def(self.ledger.as_ref(), &offer.cred_def_id)?;
        Ok(self
            .holder
            .create_request(None, offer, &cred_def, &self.master_secret)?)
    }

    pub fn store_credential(
        &self,
        metadata: &CredentialRequestMetadata,
        credential: &Credential,
    ) -> RootResult<CredentialId> {
        let cred_def = read_cred_def(self.ledger.as_ref(), &credential.cred_def_id)?;
        Ok(self
            .holder
            .store_credential(None, metadata, credential, &cred_def)?)
    }

    pub fn credentials(&self) -> RootResult<Vec<CredentialInfo>> {
        Ok(self.holder.credentials()?)
    }

    pub fn find_credentials(&self, request: &ProofRequest) -> RootResult<CredentialsForRequest> {
        Ok(find_credentials(&self.holder, request)?)
    }

    /// Non-revocation state of a stored credential at `at`. The latest cached
    /// state at or before `at` is advanced with only the ledger entries after
    /// the one it was built from; without one the state is rebuilt from
    /// genesis. Entries are tracked by sequence number, so several written in
    /// the same second are never skipped.
    pub fn revocation_state(&self, cred_id: &CredentialId, at: Timestamp) -> RootResult<RevocationState> {
        let credential = self.holder.credential(cred_id)?;
        let (Some(registry_id), Some(index)) = (&credential.rev_reg_id, credential.rev_reg_index) else {
            return Err(CredErrorDetail::new(
                CredError::RevocationNotSupported(credential.cred_def_id.to_string()),
                "credential has no revocation registry",
            )
            .with_credential_id(cred_id.as_str())
            .into());
        };

        let ledger = self.ledger.as_ref();
        let cached = self
            .holder
            .latest_revocation_state(cred_id, at)?
            .and_then(|previous| previous.ledger_seq_no.map(|seq_no| (previous, seq_no)));
        let state = match cached {
            Some((previous, seq_no)) => {
                let anchor = Some((seq_no, previous.accumulator_as_of));
                let (chain, last) = read_delta_chain_after(ledger, registry_id, anchor, at)?;
                if chain.is_empty() && previous.timestamp == at {
                    return Ok(previous);
                }
                let def = read_rev_reg_def(ledger, registry_id)?;
                let mut state = update_witness(self.engine.as_ref(), &def, &previous, &chain, at)?;
                state.ledger_seq_no = last.or(Some(seq_no));
                state
            }
            None => {
                let def = read_rev_reg_def(ledger, registry_id)?;
                let (chain, last) = read_delta_chain_after(ledger, registry_id, None, at)?;
                let mut state = build_witness(self.engine.as_ref(), &def, &chain, index, at)?;
                state.ledger_seq_no = last;
                state
            }
        };
        self.holder.store_revocation_state(cred_id, &state)?;
        Ok(state)
    }

    /// Gather every object the selection needs and build the proof.
    pub fn present(&self, request: &ProofRequest, selection: &RequestedCredentials) -> RootResult<Proof> {
        let ledger = self.ledger.as_ref();
        let chosen: BTreeSet<(CredentialId, Option<Timestamp>)> = selection
            .requested_attributes
            .values()
            .map(|a| (a.cred_id.clone(), a.timestamp))
            .chain(
                selection
                    .requested_predicates
                    .values()
                    .map(|p| (p.cred_id.clone(), p.timestamp)),
            )
            .collect();

        let mut objects = ProverObjects::default();
        for (cred_id, timestamp) in &chosen {
            if !objects.credentials.contains_key(cred_id) {
                let credential = self.holder.credential(cred_id)?;
                if !objects.schemas.contains_key(&credential.schema_id) {
                    let schema = read_schema(ledger, &credential.schema_id)?;
                    objects.schemas.insert(schema.id.clone(), schema);
                }
                if !objects.cred_defs.contains_key(&credential.cred_def_id) {
                    let cred_def = read_cred_def(ledger, &credential.cred_def_id)?;
                    objects.cred_defs.insert(cred_def.id.clone(), cred_def);
                }
                objects.credentials.insert(cred_id.clone(), credential);
            }
            let revocable = objects
                .credentials
                .get(cred_id)
                .is_some_and(|c| c.rev_reg_id.is_some());
            if let (true, Some(at)) = (revocable, timestamp) {
                objects.rev_states.push(self.revocation_state(cred_id, *at)?);
            }
        }

        let master_secret = self.holder.master_secret(&self.master_secret)?;
        Ok(create_proof(
            self.engine.as_ref(),
            request,
            selection,
            &master_secret,
            &objects,
        )?)
    }
}

// ---------------------------------------------------------------------------
// VerifierAgent
// ---------------------------------------------------------------------------

pub struct VerifierAgent {
    ledger: Arc<dyn LedgerClient>,
    engine: Arc<dyn ProofEngine>,
}

/// A ledger object the proof names. An outage is an error; anything else
/// means the proof points at something that does not exist.
fn resolved<T>(what: &str, result: CredResult<T>) -> RootResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transient() => Err(RootError::Credential(e)),
        Err(e) => {
            tracing::warn!(object = what, error = %e, "proof rejected: object not on ledger");
            Ok(None)
        }
    }
}

impl VerifierAgent {
    pub fn new(engine: Arc<dyn ProofEngine>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger, engine }
    }

    /// Verify `proof` against objects read from this verifier's own ledger,
    /// never from anything sent along with the proof.
    pub fn verify(&self, request: &ProofRequest, proof: &Proof) -> RootResult<bool> {
        let ledger = self.ledger.as_ref();
        let mut objects = VerifierObjects::default();

        for identifier in &proof.identifiers {
            let Some(schema) = resolved("schema", read_schema(ledger, &identifier.schema_id))? else {
                return Ok(false);
            };
            objects.schemas.insert(schema.id.clone(), schema);

            let Some(cred_def) =
                resolved("credential definition", read_cred_def(ledger, &identifier.cred_def_id))?
            else {
                return Ok(false);
            };
            objects.cred_defs.insert(cred_def.id.clone(), cred_def);

            if let (Some(rev_reg_id), Some(timestamp)) = (&identifier.rev_reg_id, identifier.timestamp) {
                let Some(def) = resolved("registry definition", read_rev_reg_def(ledger, rev_reg_id))?
                else {
                    return Ok(false);
                };
                objects.rev_reg_defs.insert(def.id.clone(), def);

                let Some(registry) =
                    resolved("registry state", read_registry_state(ledger, rev_reg_id, timestamp))?
                else {
                    return Ok(false);
                };
                objects
                    .rev_regs
                    .entry(rev_reg_id.clone())
                    .or_default()
                    .insert(timestamp, registry);
            }
        }

        Ok(credex_proof::verify(
            self.engine.as_ref(),
            request,
            proof,
            &objects,
        )?)
    }
}
