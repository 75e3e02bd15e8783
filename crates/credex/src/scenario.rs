//! The reference lifecycle: issue, present, revoke, present again.

use std::collections::BTreeMap;
use std::sync::Arc;

use credex_core::{Clock, LedgerClient, Timestamp};
use credex_cred::{Filter, PredicateType, ProofEngine, SimulatedProofEngine};
use credex_ledger::{InMemoryLedger, ManualClock};
use credex_proof::{AttributeInfo, PredicateInfo, ProofRequest, ProofRequestBuilder, RequestedCredentials};
use credex_vault::Wallet;
use serde::Serialize;

use crate::agent::{IssuerAgent, ProverAgent, VerifierAgent};
use crate::config::CredexConfig;
use crate::error::RootResult;

pub const REGISTRY_CREATED_AT: Timestamp = Timestamp(100);
pub const ISSUED_AT: Timestamp = Timestamp(110);
pub const FIRST_CHECK: Timestamp = Timestamp(111);
pub const REVOKED_AT: Timestamp = Timestamp(120);
pub const SECOND_CHECK: Timestamp = Timestamp(130);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub before_revocation: bool,
    pub revealed_name: Option<String>,
    pub after_revocation: bool,
}

fn age_check(cred_def: &credex_core::CredDefId, to: Timestamp) -> RootResult<ProofRequest> {
    Ok(ProofRequestBuilder::new("age-check")
        .attribute(
            "attr1_referent",
            AttributeInfo::new("name").restrict(Filter {
                cred_def_id: Some(cred_def.clone()),
                ..Default::default()
            }),
        )
        .predicate(
            "predicate1_referent",
            PredicateInfo::new("age", PredicateType::GE, 18),
        )
        .non_revoked_to(to)
        .build()?)
}

/// Run issuer, prover and verifier against a fresh in-memory ledger driven
/// by a manual clock. Wallets live in the configured store.
pub fn run_scenario(config: &CredexConfig) -> RootResult<ScenarioReport> {
    let engine: Arc<dyn ProofEngine> = Arc::new(SimulatedProofEngine);
    let clock = Arc::new(ManualClock::new(REGISTRY_CREATED_AT));
    let ledger: Arc<dyn LedgerClient> = Arc::new(InMemoryLedger::new(clock.clone()));
    let store = config.open_store()?;

    let issuer = IssuerAgent::new(
        engine.clone(),
        ledger.clone(),
        Wallet::new("issuer", store.clone()),
        config.registry.clone(),
        config.schema.max_attributes,
    )?;
    let prover = ProverAgent::new(
        engine.clone(),
        ledger.clone(),
        Wallet::new("prover", store),
        "main",
    )?;
    let verifier = VerifierAgent::new(engine, ledger);

    let schema = issuer.publish_schema(
        "gvt",
        "1.0",
        &["name".to_string(), "age".to_string()],
    )?;
    let cred_def = issuer.publish_credential_definition(&schema, "TAG", true)?;
    let registry = issuer.publish_registry(&cred_def.id, "R1")?;

    clock.set(ISSUED_AT);
    let offer = issuer.create_offer(&cred_def.id)?;
    let (request, metadata) = prover.request_credential(&offer)?;
    let values = BTreeMap::from([
        ("name".to_string(), "Alex".to_string()),
        ("age".to_string(), "28".to_string()),
    ]);
    let credential = issuer.issue(&request, &values, Some(&registry.id))?;
    let cred_id = prover.store_credential(&metadata, &credential)?;
    tracing::info!(%cred_id, at = %clock.now(), "credential issued and stored");

    let selection = |at: Timestamp| {
        RequestedCredentials::new()
            .attribute("attr1_referent", cred_id.clone(), Some(at), true)
            .predicate("predicate1_referent", cred_id.clone(), Some(at))
    };

    let first = age_check(&cred_def.id, FIRST_CHECK)?;
    let proof = prover.present(&first, &selection(FIRST_CHECK))?;
    let before_revocation = verifier.verify(&first, &proof)?;
    let revealed_name = proof
        .requested_proof
        .revealed_attrs
        .get("attr1_referent")
        .map(|a| a.raw.clone());

    clock.set(REVOKED_AT);
    if let Some(index) = credential.rev_reg_index {
        issuer.revoke(&registry.id, index)?;
    }

    let second = age_check(&cred_def.id, SECOND_CHECK)?;
    let proof = prover.present(&second, &selection(SECOND_CHECK))?;
    let after_revocation = verifier.verify(&second, &proof)?;

    Ok(ScenarioReport {
        before_revocation,
        revealed_name,
        after_revocation,
    })
}
