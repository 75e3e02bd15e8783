//! Credential Definition Manager.
//!
//! Mints schemas, credential definitions and revocation registries into the
//! issuer's wallet. Publication is a separate step (see [`crate::ledger`]),
//! so a failed publish is retried with the keys minted here.

use crate::engine::ProofEngine;
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::registry::IssuerRegistryState;
use crate::revocation;
use crate::schema::{validate_schema_strict, validate_tag, DEFAULT_MAX_ATTRIBUTES};
use crate::types::*;
use credex_core::{
    build_cred_def_id, build_rev_reg_id, build_schema_id, hash_parts, validate_did, CredDefId,
    IssuerDid, RevRegId, SchemaId, SIGNATURE_TYPE,
};
use credex_vault::Wallet;
use std::sync::Arc;

pub(crate) const SCHEMA: &str = "schema";
pub(crate) const CRED_DEF: &str = "cred_def";
pub(crate) const CRED_DEF_KEY: &str = "cred_def_key";
pub(crate) const REV_REG_DEF: &str = "rev_reg_def";
pub(crate) const REV_REG_STATE: &str = "rev_reg_state";

fn check_did(did: &IssuerDid) -> CredResult<()> {
    validate_did(did).map_err(|_| {
        CredErrorDetail::new(
            CredError::InvalidRequest(format!("malformed issuer did {}", did)),
            "issuer did is not a valid identifier",
        )
    })
}

pub struct DefinitionManager {
    engine: Arc<dyn ProofEngine>,
    wallet: Wallet,
    max_attributes: usize,
}

impl DefinitionManager {
    pub fn new(engine: Arc<dyn ProofEngine>, wallet: Wallet) -> Self {
        Self {
            engine,
            wallet,
            max_attributes: DEFAULT_MAX_ATTRIBUTES,
        }
    }

    pub fn with_max_attributes(mut self, max_attributes: usize) -> Self {
        self.max_attributes = max_attributes;
        self
    }

    /// `AlreadyExists` if this issuer already created `(name, version)`.
    pub fn create_schema(
        &self,
        issuer_did: &IssuerDid,
        name: &str,
        version: &str,
        attr_names: &[String],
    ) -> CredResult<Schema> {
        tracing::debug!(%issuer_did, name, version, attrs = attr_names.len(), "creating schema");
        check_did(issuer_did)?;
        validate_schema_strict(name, version, attr_names, self.max_attributes)?;

        let schema = Schema {
            id: build_schema_id(issuer_did, name, version),
            issuer_did: issuer_did.clone(),
            name: name.to_string(),
            version: version.to_string(),
            attr_names: attr_names.iter().map(|a| a.trim().to_string()).collect(),
        };
        self.wallet.add_object(SCHEMA, schema.id.as_str(), &schema)?;
        tracing::info!(schema_id = %schema.id, "schema created");
        Ok(schema)
    }

    pub fn create_credential_definition(
        &self,
        issuer_did: &IssuerDid,
        schema: &Schema,
        tag: &str,
        supports_revocation: bool,
    ) -> CredResult<CredentialDefinition> {
        tracing::debug!(%issuer_did, schema_id = %schema.id, tag, supports_revocation, "creating credential definition");
        check_did(issuer_did)?;
        validate_tag(tag)?;

        let id = build_cred_def_id(issuer_did, &schema.id, tag);
        if self.wallet.has_object(CRED_DEF, id.as_str())? {
            return Err(CredErrorDetail::new(
                CredError::AlreadyExists(id.to_string()),
                "credential definition already exists",
            ));
        }
        let (public_key, private_key) =
            self.engine.new_credential_keys(schema, supports_revocation)?;
        let cred_def = CredentialDefinition {
            id,
            schema_id: schema.id.clone(),
            issuer_did: issuer_did.clone(),
            tag: tag.to_string(),
            signature_type: SIGNATURE_TYPE.to_string(),
            supports_revocation,
            public_key,
        };

        // Key first: a definition in the wallet always has its key.
        self.wallet.put_object(CRED_DEF_KEY, cred_def.id.as_str(), &private_key)?;
        if self.wallet.get_opt_object::<Schema>(SCHEMA, schema.id.as_str())?.is_none() {
            self.wallet.put_object(SCHEMA, schema.id.as_str(), schema)?;
        }
        self.wallet.add_object(CRED_DEF, cred_def.id.as_str(), &cred_def)?;
        tracing::info!(cred_def_id = %cred_def.id, "credential definition created");
        Ok(cred_def)
    }

    /// New registry bound to one of this issuer's credential definitions,
    /// with its genesis delta. The issuer's registry handle is created in the
    /// wallet alongside.
    pub fn create_revocation_registry(
        &self,
        cred_def_id: &CredDefId,
        tag: &str,
        max_credential_count: u32,
        issuance_mode: IssuanceMode,
    ) -> CredResult<(RevocationRegistryDefinition, RevocationRegistryDelta)> {
        tracing::debug!(%cred_def_id, tag, max_credential_count, %issuance_mode, "creating revocation registry");
        validate_tag(tag)?;
        if max_credential_count == 0 {
            return Err(CredErrorDetail::new(
                CredError::InvalidRequest("max_credential_count must be positive".into()),
                "registry must hold at least one credential",
            ));
        }
        let cred_def = self.credential_definition(cred_def_id)?;
        if !cred_def.supports_revocation {
            return Err(CredErrorDetail::new(
                CredError::RevocationNotSupported(cred_def_id.to_string()),
                "credential definition does not support revocation",
            ));
        }

        let id = build_rev_reg_id(&cred_def.issuer_did, cred_def_id, tag);
        if self.wallet.has_object(REV_REG_DEF, id.as_str())? {
            return Err(CredErrorDetail::new(
                CredError::AlreadyExists(id.to_string()),
                "revocation registry already exists",
            ));
        }
        let public_keys = self.engine.new_registry_keys(&id, max_credential_count)?;
        let tails_hash = hash_parts(&[public_keys.as_bytes()]).to_string();
        let def = RevocationRegistryDefinition {
            id: id.clone(),
            cred_def_id: cred_def_id.clone(),
            issuer_did: cred_def.issuer_did.clone(),
            tag: tag.to_string(),
            max_credential_count,
            issuance_mode,
            public_keys,
            tails_location: format!("tails/{}", tails_hash),
            tails_hash,
        };
        let genesis =
            revocation::genesis_delta(self.engine.as_ref(), &id, max_credential_count, issuance_mode)?;

        self.wallet.put_object(
            REV_REG_STATE,
            id.as_str(),
            &IssuerRegistryState::new(&def, &genesis),
        )?;
        self.wallet.add_object(REV_REG_DEF, id.as_str(), &def)?;
        tracing::info!(registry_id = %id, "revocation registry created");
        Ok((def, genesis))
    }

    pub fn schema(&self, id: &SchemaId) -> CredResult<Schema> {
        Ok(self.wallet.get_object(SCHEMA, id.as_str())?)
    }

    pub fn credential_definition(&self, id: &CredDefId) -> CredResult<CredentialDefinition> {
        Ok(self.wallet.get_object(CRED_DEF, id.as_str())?)
    }

    pub fn revocation_registry(&self, id: &RevRegId) -> CredResult<RevocationRegistryDefinition> {
        Ok(self.wallet.get_object(REV_REG_DEF, id.as_str())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedProofEngine;
    use credex_vault::{InMemoryStore, PartyKey};

    fn manager() -> (DefinitionManager, IssuerDid) {
        let wallet = Wallet::new("issuer", Arc::new(InMemoryStore::new()));
        let did = PartyKey::generate().did();
        (
            DefinitionManager::new(Arc::new(SimulatedProofEngine), wallet),
            did,
        )
    }

    fn attrs() -> Vec<String> {
        vec!["name".into(), "age".into()]
    }

    #[test]
    fn test_create_schema() {
        let (m, did) = manager();
        let schema = m.create_schema(&did, "gvt", "1.0", &attrs()).unwrap();
        assert_eq!(schema.id.as_str(), format!("{}:2:gvt:1.0", did));
        assert_eq!(schema.attr_names.len(), 2);
        assert_eq!(m.schema(&schema.id).unwrap(), schema);
    }

    #[test]
    fn test_duplicate_schema() {
        let (m, did) = manager();
        m.create_schema(&did, "gvt", "1.0", &attrs()).unwrap();
        let err = m.create_schema(&did, "gvt", "1.0", &attrs()).unwrap_err();
        assert!(matches!(err.kind, CredError::AlreadyExists(_)));
        // Another version is a different schema.
        m.create_schema(&did, "gvt", "1.1", &attrs()).unwrap();
    }

    #[test]
    fn test_invalid_schema_and_did() {
        let (m, did) = manager();
        let err = m.create_schema(&did, "gvt", "1.0", &[]).unwrap_err();
        assert!(matches!(err.kind, CredError::InvalidSchema(_)));

        let dup = vec!["age".to_string(), "age".to_string()];
        let err = m.create_schema(&did, "gvt", "1.0", &dup).unwrap_err();
        assert!(matches!(err.kind, CredError::InvalidSchema(_)));

        let err = m
            .create_schema(&IssuerDid::new("0OIl"), "gvt", "1.0", &attrs())
            .unwrap_err();
        assert!(matches!(err.kind, CredError::InvalidRequest(_)));
    }

    #[test]
    fn test_schema_name_with_spaces() {
        let (m, did) = manager();
        let schema = m
            .create_schema(&did, "Health Record", "2024 rev B", &attrs())
            .unwrap();
        assert_eq!(schema.name, "Health Record");
        assert!(schema.id.as_str().contains(":Health Record:"));
        let err = m.create_schema(&did, "Health:Record", "1.0", &attrs()).unwrap_err();
        assert!(matches!(err.kind, CredError::InvalidSchema(_)));
    }

    #[test]
    fn test_attribute_limit_is_configurable() {
        let (m, did) = manager();
        let m = m.with_max_attributes(1);
        let err = m.create_schema(&did, "gvt", "1.0", &attrs()).unwrap_err();
        assert!(matches!(err.kind, CredError::InvalidSchema(_)));
    }

    #[test]
    fn test_cred_def_and_registry() {
        let (m, did) = manager();
        let schema = m.create_schema(&did, "gvt", "1.0", &attrs()).unwrap();
        let cd = m.create_credential_definition(&did, &schema, "TAG", true).unwrap();
        assert_eq!(cd.id.as_str(), format!("{}:3:CL:{}:TAG", did, schema.id));

        let err = m.create_credential_definition(&did, &schema, "TAG", true).unwrap_err();
        assert!(matches!(err.kind, CredError::AlreadyExists(_)));

        let (def, genesis) = m
            .create_revocation_registry(&cd.id, "R1", 5, IssuanceMode::ByDefault)
            .unwrap();
        assert_eq!(def.id.as_str(), format!("{}:4:{}:CL_ACCUM:R1", did, cd.id));
        assert_eq!(genesis.issued.len(), 5);
        assert!(genesis.is_genesis());
        assert!(def.tails_location.ends_with(&def.tails_hash));

        let err = m
            .create_revocation_registry(&cd.id, "R1", 5, IssuanceMode::ByDefault)
            .unwrap_err();
        assert!(matches!(err.kind, CredError::AlreadyExists(_)));
    }

    #[test]
    fn test_registry_requires_revocation_support() {
        let (m, did) = manager();
        let schema = m.create_schema(&did, "gvt", "1.0", &attrs()).unwrap();
        let cd = m.create_credential_definition(&did, &schema, "PLAIN", false).unwrap();
        let err = m
            .create_revocation_registry(&cd.id, "R1", 5, IssuanceMode::OnDemand)
            .unwrap_err();
        assert!(matches!(err.kind, CredError::RevocationNotSupported(_)));

        let err = m
            .create_revocation_registry(&CredDefId::new("nope"), "R1", 5, IssuanceMode::OnDemand)
            .unwrap_err();
        assert!(matches!(err.kind, CredError::NotFound(_)));
    }

    #[test]
    fn test_zero_capacity_registry_rejected() {
        let (m, did) = manager();
        let schema = m.create_schema(&did, "gvt", "1.0", &attrs()).unwrap();
        let cd = m.create_credential_definition(&did, &schema, "TAG", true).unwrap();
        let err = m
            .create_revocation_registry(&cd.id, "R1", 0, IssuanceMode::OnDemand)
            .unwrap_err();
        assert!(matches!(err.kind, CredError::InvalidRequest(_)));
    }
}
