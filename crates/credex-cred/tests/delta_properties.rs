//! Property tests for delta composition and witness reconstruction.
//!
//! A random sequence of issue/revoke operations is replayed into a stamped
//! chain (genesis at t=100, one delta every 10 seconds) and checked against
//! the composition and monotonicity laws.

use credex_core::{CredDefId, IssuerDid, RevRegId, Timestamp};
use credex_cred::revocation::{genesis_delta, issuance_delta, revocation_delta};
use credex_cred::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

const MAX: u32 = 8;
const E: SimulatedProofEngine = SimulatedProofEngine;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn registry_id() -> RevRegId {
    RevRegId::new("did:4:cd:CL_ACCUM:prop")
}

fn definition() -> RevocationRegistryDefinition {
    RevocationRegistryDefinition {
        id: registry_id(),
        cred_def_id: CredDefId::new("cd"),
        issuer_did: IssuerDid::new("did"),
        tag: "prop".into(),
        max_credential_count: MAX,
        issuance_mode: IssuanceMode::OnDemand,
        public_keys: E.new_registry_keys(&registry_id(), MAX).unwrap(),
        tails_location: String::new(),
        tails_hash: String::new(),
    }
}

fn time_of(position: usize) -> Timestamp {
    Timestamp(100 + 10 * position as u64)
}

/// Replay `ops` (true = issue, false = revoke) keeping only the valid ones.
fn build_chain(ops: &[(bool, u32)]) -> Vec<RevocationRegistryDelta> {
    let mut genesis = genesis_delta(&E, &registry_id(), MAX, IssuanceMode::OnDemand).unwrap();
    genesis.valid_to = Some(time_of(0));
    let mut chain = vec![genesis];
    let mut issued = BTreeSet::new();
    let mut revoked = BTreeSet::new();

    for &(issue, index) in ops {
        let head = chain.last().unwrap().new_accumulator.clone();
        let delta = if issue && !issued.contains(&index) {
            issued.insert(index);
            issuance_delta(&E, &registry_id(), &head, index).unwrap()
        } else if !issue && issued.contains(&index) && !revoked.contains(&index) {
            revoked.insert(index);
            revocation_delta(&E, &registry_id(), &head, index).unwrap()
        } else {
            continue;
        };
        let position = chain.len();
        chain.push(RevocationRegistryDelta {
            valid_from: Some(time_of(position - 1)),
            valid_to: Some(time_of(position)),
            ..delta
        });
    }
    chain
}

fn ops_strategy() -> impl Strategy<Value = Vec<(bool, u32)>> {
    prop::collection::vec((prop::bool::weighted(0.6), 0..MAX), 2..24)
}

// ── proptest! blocks ──────────────────────────────────────────────────────────

proptest! {
    /// Regrouping three contiguous deltas never changes the result.
    #[test]
    fn prop_merge_is_associative(ops in ops_strategy(), pick in any::<prop::sample::Index>()) {
        let chain = build_chain(&ops);
        prop_assume!(chain.len() >= 3);
        let start = pick.index(chain.len() - 2);
        let (d1, d2, d3) = (&chain[start], &chain[start + 1], &chain[start + 2]);

        let left = merge_deltas(&E, &merge_deltas(&E, d1, d2).unwrap(), d3).unwrap();
        let right = merge_deltas(&E, d1, &merge_deltas(&E, d2, d3).unwrap()).unwrap();
        prop_assert_eq!(&left.new_accumulator, &right.new_accumulator);
        prop_assert_eq!(&left.issued, &right.issued);
        prop_assert_eq!(&left.revoked, &right.revoked);
        prop_assert_eq!(left, right);
    }

    /// Argument order does not matter for contiguous deltas.
    #[test]
    fn prop_merge_order_independent(ops in ops_strategy(), pick in any::<prop::sample::Index>()) {
        let chain = build_chain(&ops);
        prop_assume!(chain.len() >= 2);
        let start = pick.index(chain.len() - 1);
        let ab = merge_deltas(&E, &chain[start], &chain[start + 1]).unwrap();
        let ba = merge_deltas(&E, &chain[start + 1], &chain[start]).unwrap();
        prop_assert_eq!(ab, ba);
    }

    /// The composed chain ends at the last published accumulator.
    #[test]
    fn prop_compose_reaches_head(ops in ops_strategy()) {
        let chain = build_chain(&ops);
        let composed = compose(&E, &chain).unwrap();
        prop_assert_eq!(&composed.new_accumulator, &chain.last().unwrap().new_accumulator);
        prop_assert_eq!(composed.valid_to, chain.last().unwrap().valid_to);
        prop_assert!(composed.is_genesis());
    }

    /// Once an index reads revoked, it reads revoked at every later time.
    #[test]
    fn prop_revocation_is_monotonic(ops in ops_strategy()) {
        let chain = build_chain(&ops);
        let def = definition();
        let end = chain.len() + 2;
        for index in 0..MAX {
            let mut seen_revoked = false;
            for position in 0..end {
                let t = time_of(position);
                match build_witness(&E, &def, &chain, index, t) {
                    Ok(state) if state.is_revoked() => seen_revoked = true,
                    Ok(_) => prop_assert!(!seen_revoked, "index {} active again at {}", index, t),
                    Err(err) => {
                        prop_assert_eq!(err.kind, CredError::IndexNotIssued(index));
                        prop_assert!(!seen_revoked);
                    }
                }
            }
        }
    }

    /// Advancing an old witness with the later deltas matches a rebuild.
    #[test]
    fn prop_update_matches_rebuild(ops in ops_strategy(), split in any::<prop::sample::Index>()) {
        let chain = build_chain(&ops);
        let def = definition();
        let cut = split.index(chain.len());
        let from = time_of(cut);
        let to = time_of(chain.len());
        for index in 0..MAX {
            let Ok(earlier) = build_witness(&E, &def, &chain, index, from) else { continue };
            let updated = update_witness(&E, &def, &earlier, &chain[cut + 1..], to).unwrap();
            let rebuilt = build_witness(&E, &def, &chain, index, to).unwrap();
            prop_assert_eq!(updated, rebuilt);
        }
    }
}
