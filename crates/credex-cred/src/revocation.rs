//! Revocation state engine.
//!
//! Pure functions over registry definitions and delta chains. Nothing here
//! mutates a registry; every result is derived from its inputs, so any number
//! of provers may run these concurrently against the same ledger data.
//!
//! Delta sets are unions: `issued` holds every index issued in the delta's
//! interval and `revoked` every index revoked in it. An index present in both
//! was issued and then revoked, and reads as revoked. The set of active
//! indices after a chain starting at genesis is `issued \ revoked`.

use crate::engine::ProofEngine;
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::types::*;
use credex_core::{RevRegId, Timestamp};
use std::collections::BTreeSet;

fn composition_err(message: impl Into<String>) -> CredErrorDetail {
    let message = message.into();
    CredErrorDetail::new(CredError::InvalidDeltaComposition(message.clone()), message)
}

fn chain_err(message: impl Into<String>) -> CredErrorDetail {
    let message = message.into();
    CredErrorDetail::new(CredError::IncompleteDeltaChain(message.clone()), message)
}

// ---------------------------------------------------------------------------
// Delta construction
// ---------------------------------------------------------------------------

/// Genesis delta of a new registry. Under `ByDefault` every index starts
/// issued; under `OnDemand` none do.
pub fn genesis_delta(
    engine: &dyn ProofEngine,
    registry_id: &RevRegId,
    max_credential_count: u32,
    mode: IssuanceMode,
) -> CredResult<RevocationRegistryDelta> {
    let issued: BTreeSet<u32> = match mode {
        IssuanceMode::ByDefault => (0..max_credential_count).collect(),
        IssuanceMode::OnDemand => BTreeSet::new(),
    };
    let new_accumulator = engine.accumulate(registry_id, None, &issued, &BTreeSet::new())?;
    Ok(RevocationRegistryDelta {
        registry_id: registry_id.clone(),
        issued,
        revoked: BTreeSet::new(),
        prior_accumulator: None,
        new_accumulator,
        valid_from: None,
        valid_to: None,
    })
}

/// Delta flagging one index issued.
pub fn issuance_delta(
    engine: &dyn ProofEngine,
    registry_id: &RevRegId,
    prior: &Accumulator,
    index: u32,
) -> CredResult<RevocationRegistryDelta> {
    step_delta(engine, registry_id, prior, BTreeSet::from([index]), BTreeSet::new())
}

/// Delta flipping one index to revoked.
pub fn revocation_delta(
    engine: &dyn ProofEngine,
    registry_id: &RevRegId,
    prior: &Accumulator,
    index: u32,
) -> CredResult<RevocationRegistryDelta> {
    step_delta(engine, registry_id, prior, BTreeSet::new(), BTreeSet::from([index]))
}

/// One delta revoking every index in `indices`.
pub fn batch_revocation_delta(
    engine: &dyn ProofEngine,
    registry_id: &RevRegId,
    prior: &Accumulator,
    indices: &BTreeSet<u32>,
) -> CredResult<RevocationRegistryDelta> {
    step_delta(engine, registry_id, prior, BTreeSet::new(), indices.clone())
}

fn step_delta(
    engine: &dyn ProofEngine,
    registry_id: &RevRegId,
    prior: &Accumulator,
    issued: BTreeSet<u32>,
    revoked: BTreeSet<u32>,
) -> CredResult<RevocationRegistryDelta> {
    let new_accumulator = engine.accumulate(registry_id, Some(prior), &issued, &revoked)?;
    Ok(RevocationRegistryDelta {
        registry_id: registry_id.clone(),
        issued,
        revoked,
        prior_accumulator: Some(prior.clone()),
        new_accumulator,
        valid_from: None,
        valid_to: None,
    })
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// `second` starts where `first` ends, by ledger interval.
fn follows_in_time(first: &RevocationRegistryDelta, second: &RevocationRegistryDelta) -> bool {
    matches!((first.valid_to, second.valid_from), (Some(to), Some(from)) if to == from)
}

/// `second` starts from the accumulator `first` produced.
fn follows_in_value(first: &RevocationRegistryDelta, second: &RevocationRegistryDelta) -> bool {
    second.prior_accumulator.as_ref() == Some(&first.new_accumulator)
}

fn sequential_order<'a>(
    a: &'a RevocationRegistryDelta,
    b: &'a RevocationRegistryDelta,
) -> Option<(&'a RevocationRegistryDelta, &'a RevocationRegistryDelta)> {
    if a.is_published() && b.is_published() {
        match (follows_in_time(a, b), follows_in_time(b, a)) {
            (true, false) => return Some((a, b)),
            (false, true) => return Some((b, a)),
            (false, false) => return None,
            // Zero-width intervals: fall back to the accumulator chain.
            (true, true) => {}
        }
    }
    if follows_in_value(a, b) {
        Some((a, b))
    } else if follows_in_value(b, a) {
        Some((b, a))
    } else {
        None
    }
}

fn sequential_merge(
    first: &RevocationRegistryDelta,
    second: &RevocationRegistryDelta,
) -> CredResult<RevocationRegistryDelta> {
    if !follows_in_value(first, second) {
        return Err(composition_err(format!(
            "contiguous deltas of {} disagree on the accumulator",
            first.registry_id
        )));
    }
    Ok(RevocationRegistryDelta {
        registry_id: first.registry_id.clone(),
        issued: first.issued.union(&second.issued).copied().collect(),
        revoked: first.revoked.union(&second.revoked).copied().collect(),
        prior_accumulator: first.prior_accumulator.clone(),
        new_accumulator: second.new_accumulator.clone(),
        valid_from: first.valid_from,
        valid_to: second.valid_to,
    })
}

fn commuting_merge(
    engine: &dyn ProofEngine,
    a: &RevocationRegistryDelta,
    b: &RevocationRegistryDelta,
) -> CredResult<RevocationRegistryDelta> {
    let issued: BTreeSet<u32> = a.issued.union(&b.issued).copied().collect();
    let revoked: BTreeSet<u32> = a.revoked.union(&b.revoked).copied().collect();
    let new_accumulator =
        engine.accumulate(&a.registry_id, a.prior_accumulator.as_ref(), &issued, &revoked)?;
    let valid_to = match (a.valid_to, b.valid_to) {
        (Some(x), Some(y)) => Some(x.max(y)),
        _ => None,
    };
    Ok(RevocationRegistryDelta {
        registry_id: a.registry_id.clone(),
        issued,
        revoked,
        prior_accumulator: a.prior_accumulator.clone(),
        new_accumulator,
        valid_from: a.valid_from,
        valid_to,
    })
}

/// Merge two deltas of one registry into a single delta.
///
/// Contiguous deltas (one's interval ends where the other's starts, or, for
/// unpublished deltas, one's accumulator continues the other's) compose in
/// their natural order regardless of argument order. Deltas starting from the
/// same accumulator and touching disjoint indices commute. Anything else is
/// an `InvalidDeltaComposition`.
pub fn merge_deltas(
    engine: &dyn ProofEngine,
    a: &RevocationRegistryDelta,
    b: &RevocationRegistryDelta,
) -> CredResult<RevocationRegistryDelta> {
    if a.registry_id != b.registry_id {
        return Err(composition_err(format!(
            "deltas of {} and {} cannot be merged",
            a.registry_id, b.registry_id
        )));
    }
    if a == b {
        return Ok(a.clone());
    }
    if let Some((first, second)) = sequential_order(a, b) {
        return sequential_merge(first, second);
    }
    let same_start =
        a.prior_accumulator == b.prior_accumulator && a.valid_from == b.valid_from;
    if same_start && a.touched().is_disjoint(&b.touched()) {
        return commuting_merge(engine, a, b);
    }
    Err(composition_err(format!(
        "deltas of {} overlap with conflicting accumulators",
        a.registry_id
    )))
}

/// Fold an ordered chain into one delta.
pub fn compose(
    engine: &dyn ProofEngine,
    chain: &[RevocationRegistryDelta],
) -> CredResult<RevocationRegistryDelta> {
    let (first, rest) = chain
        .split_first()
        .ok_or_else(|| chain_err("no deltas to compose"))?;
    rest.iter()
        .try_fold(first.clone(), |acc, d| merge_deltas(engine, &acc, d))
}

// ---------------------------------------------------------------------------
// Witness reconstruction
// ---------------------------------------------------------------------------

fn check_extends(
    head: &RevocationRegistryDelta,
    next: &RevocationRegistryDelta,
) -> CredResult<()> {
    if next.valid_from != head.valid_to || !follows_in_value(head, next) {
        return Err(chain_err(format!(
            "gap in chain of {} after {}",
            head.registry_id,
            head.valid_to.map(|t| t.to_string()).unwrap_or_else(|| "genesis".into())
        )));
    }
    Ok(())
}

/// Published deltas with `valid_to <= timestamp`, folded strictly in order.
fn fold_until(
    head: RevocationRegistryDelta,
    chain: &[RevocationRegistryDelta],
    registry_id: &RevRegId,
    timestamp: Timestamp,
) -> CredResult<RevocationRegistryDelta> {
    let mut acc = head;
    for delta in chain {
        if &delta.registry_id != registry_id {
            return Err(composition_err(format!(
                "delta of {} in chain of {}",
                delta.registry_id, registry_id
            )));
        }
        let valid_to = delta
            .valid_to
            .ok_or_else(|| chain_err("chain contains an unpublished delta"))?;
        if valid_to > timestamp {
            continue;
        }
        check_extends(&acc, delta)?;
        acc = sequential_merge(&acc, delta)?;
    }
    Ok(acc)
}

fn status_of(
    composed: &RevocationRegistryDelta,
    index: u32,
) -> CredResult<RevocationStatus> {
    if composed.revoked.contains(&index) {
        Ok(RevocationStatus::Revoked)
    } else if composed.issued.contains(&index) {
        Ok(RevocationStatus::Active)
    } else {
        Err(CredError::IndexNotIssued(index).into())
    }
}

/// Reconstruct the non-revocation state of `index` at `timestamp`.
///
/// `chain` must start at the registry genesis and be contiguous up to the
/// latest delta with `valid_to <= timestamp`; deltas after `timestamp` are
/// ignored.
pub fn build_witness(
    engine: &dyn ProofEngine,
    def: &RevocationRegistryDefinition,
    chain: &[RevocationRegistryDelta],
    index: u32,
    timestamp: Timestamp,
) -> CredResult<RevocationState> {
    tracing::debug!(registry_id = %def.id, index, %timestamp, deltas = chain.len(), "building witness");

    let (genesis, rest) = chain
        .split_first()
        .ok_or_else(|| chain_err("no deltas supplied"))?;
    if genesis.registry_id != def.id {
        return Err(composition_err(format!(
            "delta of {} in chain of {}",
            genesis.registry_id, def.id
        )));
    }
    if !genesis.is_genesis() {
        return Err(chain_err("chain does not start at registry genesis"));
    }
    let created = genesis
        .valid_to
        .ok_or_else(|| chain_err("genesis delta is not published"))?;
    if timestamp < created {
        return Err(CredErrorDetail::new(
            CredError::InvalidTimestamp(format!(
                "{} precedes registry creation at {}",
                timestamp, created
            )),
            "timestamp precedes registry creation",
        ));
    }
    if index >= def.max_credential_count {
        return Err(CredError::IndexNotIssued(index).into());
    }

    let composed = fold_until(genesis.clone(), rest, &def.id, timestamp)?;
    let status = status_of(&composed, index)?;
    let active: BTreeSet<u32> = composed.issued.difference(&composed.revoked).copied().collect();
    let witness = engine.build_witness(&def.id, &active, index)?;

    Ok(RevocationState {
        registry_id: def.id.clone(),
        index,
        timestamp,
        accumulator: composed.new_accumulator,
        accumulator_as_of: composed.valid_to.unwrap_or(created),
        ledger_seq_no: None,
        status,
        witness,
    })
}

/// Advance an earlier state to `timestamp` using only the deltas published
/// after it, i.e. the bounded chain `(previous.accumulator_as_of, timestamp]`.
pub fn update_witness(
    engine: &dyn ProofEngine,
    def: &RevocationRegistryDefinition,
    previous: &RevocationState,
    chain: &[RevocationRegistryDelta],
    timestamp: Timestamp,
) -> CredResult<RevocationState> {
    tracing::debug!(registry_id = %def.id, index = previous.index, from = %previous.timestamp, %timestamp, "updating witness");

    if previous.registry_id != def.id {
        return Err(composition_err("state belongs to another registry"));
    }
    if timestamp < previous.timestamp {
        return Err(CredErrorDetail::new(
            CredError::InvalidTimestamp(format!(
                "{} precedes existing state at {}",
                timestamp, previous.timestamp
            )),
            "cannot move a witness backwards",
        ));
    }

    // Seed with an empty delta ending where the previous state ends.
    let seed = RevocationRegistryDelta {
        registry_id: def.id.clone(),
        issued: BTreeSet::new(),
        revoked: BTreeSet::new(),
        prior_accumulator: Some(previous.accumulator.clone()),
        new_accumulator: previous.accumulator.clone(),
        valid_from: Some(previous.accumulator_as_of),
        valid_to: Some(previous.accumulator_as_of),
    };
    let composed = fold_until(seed, chain, &def.id, timestamp)?;

    let witness = engine.update_witness(
        &def.id,
        previous.index,
        &previous.witness,
        &composed.issued,
        &composed.revoked,
    )?;
    let status = if previous.is_revoked() || composed.revoked.contains(&previous.index) {
        RevocationStatus::Revoked
    } else {
        RevocationStatus::Active
    };

    Ok(RevocationState {
        registry_id: def.id.clone(),
        index: previous.index,
        timestamp,
        accumulator: composed.new_accumulator,
        accumulator_as_of: composed.valid_to.unwrap_or(previous.accumulator_as_of),
        ledger_seq_no: previous.ledger_seq_no,
        status,
        witness,
    })
}
