//! Issuer-side handle of one revocation registry.
//!
//! The handle is the only place an issuer allocates revocation indices. It
//! is persisted in the issuer's wallet and updated under the issuance
//! coordinator's lock; across processes the ledger's head check is what
//! serializes writers.

use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::types::*;
use credex_core::{Nonce, RevRegId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerRegistryState {
    pub registry_id: RevRegId,
    pub max_credential_count: u32,
    pub issuance_mode: IssuanceMode,
    /// Accumulator after the last delta this issuer produced.
    pub accumulator: Accumulator,
    pub issued: BTreeSet<u32>,
    pub revoked: BTreeSet<u32>,
    /// Indices bound to a delivered credential.
    assigned: BTreeSet<u32>,
    /// Reserved but not yet delivered, keyed by request nonce.
    reservations: BTreeMap<String, u32>,
    /// Released reservations, handed out before the cursor advances.
    free: BTreeSet<u32>,
    next_index: u32,
}

impl IssuerRegistryState {
    pub fn new(def: &RevocationRegistryDefinition, genesis: &RevocationRegistryDelta) -> Self {
        Self {
            registry_id: def.id.clone(),
            max_credential_count: def.max_credential_count,
            issuance_mode: def.issuance_mode,
            accumulator: genesis.new_accumulator.clone(),
            issued: genesis.issued.clone(),
            revoked: genesis.revoked.clone(),
            assigned: BTreeSet::new(),
            reservations: BTreeMap::new(),
            free: BTreeSet::new(),
            next_index: 0,
        }
    }

    /// Index for the request with this nonce. A retry of the same request gets
    /// the index it reserved the first time.
    pub fn reserve(&mut self, request_nonce: &Nonce) -> CredResult<u32> {
        if let Some(index) = self.reservations.get(request_nonce.as_str()) {
            return Ok(*index);
        }
        let index = loop {
            if let Some(index) = self.free.pop_first() {
                if self.is_spent(index) {
                    continue;
                }
                break index;
            }
            if self.next_index >= self.max_credential_count {
                return Err(CredErrorDetail::new(
                    CredError::RegistryFull,
                    format!("registry {} has no free index", self.registry_id),
                ));
            }
            let index = self.next_index;
            self.next_index += 1;
            if !self.is_spent(index) {
                break index;
            }
        };
        self.reservations.insert(request_nonce.as_str().to_string(), index);
        Ok(index)
    }

    /// Delivered or revoked; such an index is never handed out again.
    fn is_spent(&self, index: u32) -> bool {
        self.assigned.contains(&index) || self.revoked.contains(&index)
    }

    /// Give back an index reserved for an abandoned request. Only indices no
    /// credential was delivered for are returned to the pool.
    pub fn release_reservation(&mut self, request_nonce: &Nonce) -> Option<u32> {
        let index = self.reservations.remove(request_nonce.as_str())?;
        if self.assigned.contains(&index) {
            return None;
        }
        self.free.insert(index);
        Some(index)
    }

    pub fn reserved_index(&self, request_nonce: &Nonce) -> Option<u32> {
        self.reservations.get(request_nonce.as_str()).copied()
    }

    /// Record the credential for `request_nonce` as delivered, applying the
    /// issuance delta when the mode produces one.
    pub fn commit_issue(
        &mut self,
        request_nonce: &Nonce,
        index: u32,
        delta: Option<&RevocationRegistryDelta>,
    ) {
        self.reservations.remove(request_nonce.as_str());
        self.assigned.insert(index);
        if let Some(delta) = delta {
            self.apply(delta);
        }
    }

    /// `AlreadyRevoked` or `IndexNotIssued` when `index` cannot be revoked.
    pub fn check_revocable(&self, index: u32) -> CredResult<()> {
        if self.revoked.contains(&index) {
            return Err(CredError::AlreadyRevoked(index).into());
        }
        if index >= self.max_credential_count || !self.issued.contains(&index) {
            return Err(CredError::IndexNotIssued(index).into());
        }
        // Under ByDefault every index is issued from genesis; only one bound
        // to a delivered credential can be revoked.
        if self.issuance_mode == IssuanceMode::ByDefault && !self.assigned.contains(&index) {
            return Err(CredError::IndexNotIssued(index).into());
        }
        Ok(())
    }

    pub fn apply(&mut self, delta: &RevocationRegistryDelta) {
        self.issued.extend(delta.issued.iter().copied());
        self.revoked.extend(delta.revoked.iter().copied());
        self.accumulator = delta.new_accumulator.clone();
    }

    /// Adopt the ledger's view of the registry, given the composition of
    /// every published delta. Anything this issuer produced but never
    /// published is dropped, and indices the ledger shows issued are never
    /// handed out again.
    pub fn sync_from_ledger(&mut self, composed: &RevocationRegistryDelta) {
        self.accumulator = composed.new_accumulator.clone();
        self.issued = composed.issued.clone();
        self.revoked = composed.revoked.clone();

        if self.issuance_mode == IssuanceMode::OnDemand {
            if let Some(highest) = composed.touched().last() {
                self.next_index = self.next_index.max(highest + 1);
            }
            self.assigned.extend(composed.issued.iter().copied());
            let issued = &self.issued;
            self.free.retain(|i| !issued.contains(i));
        }
        // Under ByDefault only revocations reach the ledger; every revoked
        // index was necessarily assigned.
        self.assigned.extend(composed.revoked.iter().copied());
        let assigned = &self.assigned;
        self.free.retain(|i| !assigned.contains(i));
    }

    pub fn status_of(&self, index: u32) -> Option<RevocationStatus> {
        if self.revoked.contains(&index) {
            Some(RevocationStatus::Revoked)
        } else if self.issued.contains(&index) {
            Some(RevocationStatus::Active)
        } else {
            None
        }
    }

    pub fn pending_reservations(&self) -> usize {
        self.reservations.len()
    }
}
