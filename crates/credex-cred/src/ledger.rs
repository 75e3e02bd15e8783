//! Publication to and reads from the ledger.
//!
//! Creation and publication are separate steps: definitions are minted into
//! the issuer's wallet first and published here, so a failed publish can be
//! retried with the same keys. Immutable objects republish idempotently.

use crate::engine::ProofEngine;
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::revocation;
use crate::types::*;
use credex_core::{
    CredDefId, LedgerClient, LedgerObjectType, RevRegId, SchemaId, SeqNo, Timestamp,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

fn publish<T: Serialize>(
    ledger: &dyn LedgerClient,
    object_type: LedgerObjectType,
    id: &str,
    object: &T,
) -> CredResult<SeqNo> {
    let payload = serde_json::to_value(object)?;
    let seq_no = ledger.publish(object_type, id, &payload)?;
    tracing::info!(%object_type, id, %seq_no, "published");
    Ok(seq_no)
}

fn read_object<T: DeserializeOwned>(
    ledger: &dyn LedgerClient,
    object_type: LedgerObjectType,
    id: &str,
) -> CredResult<T> {
    match ledger.read(object_type, id, None)? {
        Some(record) => Ok(record.decode()?),
        None => Err(CredErrorDetail::new(
            CredError::NotFound(format!("{} {}", object_type, id)),
            "object is not on the ledger",
        )),
    }
}

pub fn publish_schema(ledger: &dyn LedgerClient, schema: &Schema) -> CredResult<SeqNo> {
    publish(ledger, LedgerObjectType::Schema, schema.id.as_str(), schema)
}

pub fn publish_cred_def(
    ledger: &dyn LedgerClient,
    cred_def: &CredentialDefinition,
) -> CredResult<SeqNo> {
    publish(
        ledger,
        LedgerObjectType::CredentialDefinition,
        cred_def.id.as_str(),
        cred_def,
    )
}

/// Publish a registry definition followed by its genesis delta.
pub fn publish_registry(
    ledger: &dyn LedgerClient,
    def: &RevocationRegistryDefinition,
    genesis: &RevocationRegistryDelta,
) -> CredResult<SeqNo> {
    publish(
        ledger,
        LedgerObjectType::RevocationRegistryDefinition,
        def.id.as_str(),
        def,
    )?;
    publish_delta(ledger, genesis)
}

/// Append a delta to its registry. The ledger rejects deltas that do not
/// continue the registry's current accumulator.
pub fn publish_delta(
    ledger: &dyn LedgerClient,
    delta: &RevocationRegistryDelta,
) -> CredResult<SeqNo> {
    publish(
        ledger,
        LedgerObjectType::RevocationRegistryEntry,
        delta.registry_id.as_str(),
        &delta.unstamped(),
    )
}

pub fn read_schema(ledger: &dyn LedgerClient, id: &SchemaId) -> CredResult<Schema> {
    read_object(ledger, LedgerObjectType::Schema, id.as_str())
}

pub fn read_cred_def(ledger: &dyn LedgerClient, id: &CredDefId) -> CredResult<CredentialDefinition> {
    read_object(ledger, LedgerObjectType::CredentialDefinition, id.as_str())
}

pub fn read_rev_reg_def(
    ledger: &dyn LedgerClient,
    id: &RevRegId,
) -> CredResult<RevocationRegistryDefinition> {
    read_object(
        ledger,
        LedgerObjectType::RevocationRegistryDefinition,
        id.as_str(),
    )
}

/// Published deltas with `from < txn_time <= to`, oldest first, each stamped
/// with its ledger interval: from the previous entry's time (none for the
/// genesis entry) to its own.
pub fn read_delta_chain(
    ledger: &dyn LedgerClient,
    registry_id: &RevRegId,
    from: Option<Timestamp>,
    to: Timestamp,
) -> CredResult<Vec<RevocationRegistryDelta>> {
    let mut previous = match from {
        Some(t) => ledger
            .read(LedgerObjectType::RevocationRegistryEntry, registry_id.as_str(), Some(t))?
            .map(|r| r.txn_time),
        None => None,
    };
    let records = ledger.read_entries(registry_id, from, to)?;
    let mut chain = Vec::with_capacity(records.len());
    for record in records {
        let mut delta: RevocationRegistryDelta = record.decode()?;
        delta.valid_from = previous;
        delta.valid_to = Some(record.txn_time);
        previous = Some(record.txn_time);
        chain.push(delta);
    }
    tracing::debug!(%registry_id, deltas = chain.len(), %to, "read delta chain");
    Ok(chain)
}

/// Published deltas after the entry `after` (sequence number and its ledger
/// time), up to `to`. Unlike `read_delta_chain` this keeps entries written in
/// the same second as `after`. Returns the chain and the sequence number of
/// its last entry. `None` reads from the registry genesis.
pub fn read_delta_chain_after(
    ledger: &dyn LedgerClient,
    registry_id: &RevRegId,
    after: Option<(SeqNo, Timestamp)>,
    to: Timestamp,
) -> CredResult<(Vec<RevocationRegistryDelta>, Option<SeqNo>)> {
    let (from, mut previous) = match after {
        Some((_, as_of)) if as_of.as_secs() > 0 => {
            (Some(Timestamp(as_of.as_secs() - 1)), Some(as_of))
        }
        Some((_, as_of)) => (None, Some(as_of)),
        None => (None, None),
    };
    let skip_through = after.map(|(seq_no, _)| seq_no);
    let records = ledger.read_entries(registry_id, from, to)?;
    let mut chain = Vec::with_capacity(records.len());
    let mut last = None;
    for record in records {
        if skip_through.is_some_and(|s| record.seq_no <= s) {
            previous = Some(record.txn_time);
            continue;
        }
        let mut delta: RevocationRegistryDelta = record.decode()?;
        delta.valid_from = previous;
        delta.valid_to = Some(record.txn_time);
        previous = Some(record.txn_time);
        last = Some(record.seq_no);
        chain.push(delta);
    }
    tracing::debug!(%registry_id, deltas = chain.len(), ?skip_through, %to, "read delta chain after entry");
    Ok((chain, last))
}

/// Single delta covering `(from, to]`, or `None` if nothing was published in
/// that interval.
pub fn read_delta(
    ledger: &dyn LedgerClient,
    engine: &dyn ProofEngine,
    registry_id: &RevRegId,
    from: Option<Timestamp>,
    to: Timestamp,
) -> CredResult<Option<RevocationRegistryDelta>> {
    let chain = read_delta_chain(ledger, registry_id, from, to)?;
    if chain.is_empty() {
        return Ok(None);
    }
    revocation::compose(engine, &chain).map(Some)
}

/// Ledger time of the latest published entry of a registry.
pub fn latest_entry_time(ledger: &dyn LedgerClient, registry_id: &RevRegId) -> CredResult<Timestamp> {
    ledger
        .read(LedgerObjectType::RevocationRegistryEntry, registry_id.as_str(), None)?
        .map(|r| r.txn_time)
        .ok_or_else(|| {
            CredErrorDetail::new(
                CredError::NotFound(format!("registry {}", registry_id)),
                "registry has no published entries",
            )
        })
}

/// Accumulator of a registry as of `at`.
pub fn read_registry_state(
    ledger: &dyn LedgerClient,
    registry_id: &RevRegId,
    at: Timestamp,
) -> CredResult<RevocationRegistry> {
    let record = ledger.read(
        LedgerObjectType::RevocationRegistryEntry,
        registry_id.as_str(),
        Some(at),
    )?;
    let Some(record) = record else {
        // Distinguish an unknown registry from a time before its genesis.
        read_rev_reg_def(ledger, registry_id)?;
        return Err(CredErrorDetail::new(
            CredError::InvalidTimestamp(format!("{} precedes registry {}", at, registry_id)),
            "no registry state at that time",
        ));
    };
    let delta: RevocationRegistryDelta = record.decode()?;
    Ok(RevocationRegistry {
        registry_id: registry_id.clone(),
        accumulator: delta.new_accumulator,
        as_of: record.txn_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedProofEngine;
    use credex_core::IssuerDid;
    use credex_ledger::{InMemoryLedger, ManualClock};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const E: SimulatedProofEngine = SimulatedProofEngine;

    struct Fixture {
        clock: Arc<ManualClock>,
        ledger: InMemoryLedger,
        def: RevocationRegistryDefinition,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Timestamp(100)));
        let ledger = InMemoryLedger::new(clock.clone());
        let did = IssuerDid::new("V4SGRU86Z58d6TV7PBUe6f");
        let schema = Schema {
            id: credex_core::build_schema_id(&did, "gvt", "1.0"),
            issuer_did: did.clone(),
            name: "gvt".into(),
            version: "1.0".into(),
            attr_names: BTreeSet::from(["name".to_string()]),
        };
        let (public_key, _) = E.new_credential_keys(&schema, true).unwrap();
        let cred_def = CredentialDefinition {
            id: credex_core::build_cred_def_id(&did, &schema.id, "TAG"),
            schema_id: schema.id.clone(),
            issuer_did: did.clone(),
            tag: "TAG".into(),
            signature_type: "CL".into(),
            supports_revocation: true,
            public_key,
        };
        let id = credex_core::build_rev_reg_id(&did, &cred_def.id, "R1");
        let def = RevocationRegistryDefinition {
            id: id.clone(),
            cred_def_id: cred_def.id.clone(),
            issuer_did: did,
            tag: "R1".into(),
            max_credential_count: 4,
            issuance_mode: IssuanceMode::OnDemand,
            public_keys: E.new_registry_keys(&id, 4).unwrap(),
            tails_location: String::new(),
            tails_hash: String::new(),
        };
        publish_schema(&ledger, &schema).unwrap();
        publish_cred_def(&ledger, &cred_def).unwrap();
        Fixture { clock, ledger, def }
    }

    #[test]
    fn test_definitions_round_trip() {
        let f = fixture();
        let genesis = revocation::genesis_delta(&E, &f.def.id, 4, IssuanceMode::OnDemand).unwrap();
        publish_registry(&f.ledger, &f.def, &genesis).unwrap();
        assert_eq!(read_rev_reg_def(&f.ledger, &f.def.id).unwrap(), f.def);
        let cd = read_cred_def(&f.ledger, &f.def.cred_def_id).unwrap();
        assert_eq!(read_schema(&f.ledger, &cd.schema_id).unwrap().name, "gvt");

        // Retrying the whole publication is harmless.
        publish_registry(&f.ledger, &f.def, &genesis).unwrap();
    }

    #[test]
    fn test_missing_objects() {
        let f = fixture();
        let err = read_rev_reg_def(&f.ledger, &f.def.id).unwrap_err();
        assert!(matches!(err.kind, CredError::NotFound(_)));

        let genesis = revocation::genesis_delta(&E, &f.def.id, 4, IssuanceMode::OnDemand).unwrap();
        let err = publish_delta(&f.ledger, &genesis).unwrap_err();
        assert!(matches!(err.kind, CredError::NotFound(_)));
    }

    #[test]
    fn test_chain_is_stamped_from_ledger_times() {
        let f = fixture();
        let genesis = revocation::genesis_delta(&E, &f.def.id, 4, IssuanceMode::OnDemand).unwrap();
        publish_registry(&f.ledger, &f.def, &genesis).unwrap();
        f.clock.set(Timestamp(110));
        let d1 = revocation::issuance_delta(&E, &f.def.id, &genesis.new_accumulator, 0).unwrap();
        publish_delta(&f.ledger, &d1).unwrap();
        f.clock.set(Timestamp(120));
        let d2 = revocation::revocation_delta(&E, &f.def.id, &d1.new_accumulator, 0).unwrap();
        publish_delta(&f.ledger, &d2).unwrap();

        let chain = read_delta_chain(&f.ledger, &f.def.id, None, Timestamp(200)).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].valid_from, None);
        assert_eq!(chain[1].valid_from, Some(Timestamp(100)));
        assert_eq!(chain[2].valid_to, Some(Timestamp(120)));

        let tail = read_delta_chain(&f.ledger, &f.def.id, Some(Timestamp(112)), Timestamp(200)).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].valid_from, Some(Timestamp(110)));

        let whole = read_delta(&f.ledger, &E, &f.def.id, None, Timestamp(200)).unwrap().unwrap();
        assert_eq!(whole.new_accumulator, d2.new_accumulator);
        assert!(read_delta(&f.ledger, &E, &f.def.id, Some(Timestamp(120)), Timestamp(200))
            .unwrap()
            .is_none());

        let state = read_registry_state(&f.ledger, &f.def.id, Timestamp(115)).unwrap();
        assert_eq!(state.accumulator, d1.new_accumulator);
        assert_eq!(state.as_of, Timestamp(110));
        let err = read_registry_state(&f.ledger, &f.def.id, Timestamp(50)).unwrap_err();
        assert!(matches!(err.kind, CredError::InvalidTimestamp(_)));
        assert_eq!(latest_entry_time(&f.ledger, &f.def.id).unwrap(), Timestamp(120));
    }

    #[test]
    fn test_chain_after_entry_keeps_same_second_entries() {
        let f = fixture();
        let genesis = revocation::genesis_delta(&E, &f.def.id, 4, IssuanceMode::OnDemand).unwrap();
        publish_registry(&f.ledger, &f.def, &genesis).unwrap();
        f.clock.set(Timestamp(110));
        let d1 = revocation::issuance_delta(&E, &f.def.id, &genesis.new_accumulator, 0).unwrap();
        let seq1 = publish_delta(&f.ledger, &d1).unwrap();
        let d2 = revocation::issuance_delta(&E, &f.def.id, &d1.new_accumulator, 1).unwrap();
        let seq2 = publish_delta(&f.ledger, &d2).unwrap();

        let (full, last) = read_delta_chain_after(&f.ledger, &f.def.id, None, Timestamp(200)).unwrap();
        assert_eq!(full.len(), 3);
        assert_eq!(last, Some(seq2));

        // A time-bounded read from 110 misses the second entry at 110.
        assert!(read_delta_chain(&f.ledger, &f.def.id, Some(Timestamp(110)), Timestamp(200))
            .unwrap()
            .is_empty());

        let (tail, last) = read_delta_chain_after(
            &f.ledger,
            &f.def.id,
            Some((seq1, Timestamp(110))),
            Timestamp(200),
        )
        .unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].new_accumulator, d2.new_accumulator);
        assert_eq!(tail[0].valid_from, Some(Timestamp(110)));
        assert_eq!(tail[0].valid_to, Some(Timestamp(110)));
        assert_eq!(last, Some(seq2));

        let (none, last) = read_delta_chain_after(
            &f.ledger,
            &f.def.id,
            Some((seq2, Timestamp(110))),
            Timestamp(200),
        )
        .unwrap();
        assert!(none.is_empty());
        assert_eq!(last, None);
    }

    #[test]
    fn test_stale_delta_rejected() {
        let f = fixture();
        let genesis = revocation::genesis_delta(&E, &f.def.id, 4, IssuanceMode::OnDemand).unwrap();
        publish_registry(&f.ledger, &f.def, &genesis).unwrap();
        let a = revocation::issuance_delta(&E, &f.def.id, &genesis.new_accumulator, 0).unwrap();
        let b = revocation::issuance_delta(&E, &f.def.id, &genesis.new_accumulator, 1).unwrap();
        publish_delta(&f.ledger, &a).unwrap();
        let err = publish_delta(&f.ledger, &b).unwrap_err();
        assert!(matches!(err.kind, CredError::AlreadyExists(_)));
    }

    #[test]
    fn test_unavailable_is_transient() {
        let f = fixture();
        f.ledger.set_available(false);
        let err = read_rev_reg_def(&f.ledger, &f.def.id).unwrap_err();
        assert!(err.is_transient());
    }
}
