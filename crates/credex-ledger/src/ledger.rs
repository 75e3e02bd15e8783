use crate::error::{LedgerError, LedgerResult};
use credex_core::{
    hash_parts, Clock, CredexResult, Digest32, LedgerClient, LedgerObjectType, LedgerRecord,
    RevRegId, SeqNo, Timestamp,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Append-only, hash-chained ledger held in memory.
///
/// Every transaction carries the hash of its predecessor, so the whole log
/// can be re-verified from genesis. Transaction times come from the injected
/// clock and never go backwards.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

#[derive(Default)]
struct LedgerState {
    txns: Vec<LedgerRecord>,
    last_time: Timestamp,
}

impl LedgerState {
    fn find_latest(
        &self,
        object_type: LedgerObjectType,
        id: &str,
        at: Option<Timestamp>,
    ) -> Option<&LedgerRecord> {
        self.txns.iter().rev().find(|r| {
            r.object_type == object_type && r.id == id && at.map_or(true, |t| r.txn_time <= t)
        })
    }
}

const ENTRY_PRIOR_FIELD: &str = "prior_accumulator";
const ENTRY_HEAD_FIELD: &str = "new_accumulator";

/// Field of a payload naming the object it depends on, and that object's type.
fn causal_dependency(
    object_type: LedgerObjectType,
    id: &str,
    payload: &serde_json::Value,
) -> LedgerResult<Option<(LedgerObjectType, String)>> {
    let field = |name: &str| {
        payload
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| LedgerError::Malformed(format!("{} {} lacks {}", object_type, id, name)))
    };
    Ok(match object_type {
        LedgerObjectType::Schema => None,
        LedgerObjectType::CredentialDefinition => {
            Some((LedgerObjectType::Schema, field("schema_id")?))
        }
        LedgerObjectType::RevocationRegistryDefinition => {
            Some((LedgerObjectType::CredentialDefinition, field("cred_def_id")?))
        }
        LedgerObjectType::RevocationRegistryEntry => Some((
            LedgerObjectType::RevocationRegistryDefinition,
            id.to_string(),
        )),
    })
}

fn compute_hash(
    previous: Option<&Digest32>,
    object_type: LedgerObjectType,
    id: &str,
    payload_bytes: &[u8],
    seq_no: SeqNo,
    txn_time: Timestamp,
) -> Digest32 {
    let prev = previous.copied().unwrap_or_default();
    hash_parts(&[
        prev.as_bytes(),
        object_type.to_string().as_bytes(),
        id.as_bytes(),
        payload_bytes,
        &seq_no.0.to_be_bytes(),
        &txn_time.0.to_be_bytes(),
    ])
}

impl InMemoryLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the ledger going offline. Every call fails with a transient
    /// error until it is brought back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn lock(&self) -> LedgerResult<std::sync::MutexGuard<'_, LedgerState>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger is offline".into()));
        }
        self.state
            .lock()
            .map_err(|e| LedgerError::Internal(format!("ledger lock poisoned: {}", e)))
    }

    fn append(
        &self,
        object_type: LedgerObjectType,
        id: &str,
        payload: &serde_json::Value,
    ) -> LedgerResult<SeqNo> {
        if id.is_empty() {
            return Err(LedgerError::Malformed("empty object id".into()));
        }
        let payload_bytes =
            serde_json::to_vec(payload).map_err(|e| LedgerError::Malformed(e.to_string()))?;

        let mut state = self.lock()?;

        if object_type.is_immutable() {
            if let Some(existing) = state.find_latest(object_type, id, None) {
                if existing.payload == *payload {
                    tracing::debug!(%object_type, id, seq_no = %existing.seq_no, "idempotent publish");
                    return Ok(existing.seq_no);
                }
                return Err(LedgerError::Conflict {
                    object_type: object_type.to_string(),
                    id: id.to_string(),
                });
            }
        } else {
            let latest = state.find_latest(object_type, id, None);
            if let Some(existing) = latest.filter(|r| r.payload == *payload) {
                tracing::debug!(%object_type, id, seq_no = %existing.seq_no, "idempotent publish");
                return Ok(existing.seq_no);
            }
            // Entries must extend the current head of the registry.
            if let Some(prior) = payload.get(ENTRY_PRIOR_FIELD) {
                let head = latest
                    .and_then(|r| r.payload.get(ENTRY_HEAD_FIELD))
                    .unwrap_or(&serde_json::Value::Null);
                if prior != head {
                    tracing::warn!(%object_type, id, "registry entry does not extend head");
                    return Err(LedgerError::Conflict {
                        object_type: object_type.to_string(),
                        id: id.to_string(),
                    });
                }
            }
        }

        if let Some((dep_type, dep_id)) = causal_dependency(object_type, id, payload)? {
            if state.find_latest(dep_type, &dep_id, None).is_none() {
                return Err(LedgerError::UnknownReference {
                    object_type: object_type.to_string(),
                    id: id.to_string(),
                    missing: format!("{} {}", dep_type, dep_id),
                });
            }
        }

        let seq_no = SeqNo(state.txns.len() as u64 + 1);
        let txn_time = self.clock.now().max(state.last_time);
        let hash = compute_hash(
            state.txns.last().map(|r| &r.hash),
            object_type,
            id,
            &payload_bytes,
            seq_no,
            txn_time,
        );

        state.txns.push(LedgerRecord {
            object_type,
            id: id.to_string(),
            payload: payload.clone(),
            seq_no,
            txn_time,
            hash,
        });
        state.last_time = txn_time;

        tracing::info!(%object_type, id, %seq_no, %txn_time, "ledger transaction written");
        Ok(seq_no)
    }

    /// Recompute every hash from genesis.
    pub fn verify_chain(&self) -> LedgerResult<bool> {
        let state = self.lock()?;
        let mut previous: Option<&Digest32> = None;
        for record in &state.txns {
            let payload_bytes = serde_json::to_vec(&record.payload)
                .map_err(|e| LedgerError::Internal(e.to_string()))?;
            let expected = compute_hash(
                previous,
                record.object_type,
                &record.id,
                &payload_bytes,
                record.seq_no,
                record.txn_time,
            );
            if expected != record.hash {
                return Ok(false);
            }
            previous = Some(&record.hash);
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.txns.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, payload: serde_json::Value) {
        let mut state = self.state.lock().unwrap();
        state.txns[index].payload = payload;
    }
}

impl LedgerClient for InMemoryLedger {
    fn publish(
        &self,
        object_type: LedgerObjectType,
        id: &str,
        payload: &serde_json::Value,
    ) -> CredexResult<SeqNo> {
        Ok(self.append(object_type, id, payload)?)
    }

    fn read(
        &self,
        object_type: LedgerObjectType,
        id: &str,
        at: Option<Timestamp>,
    ) -> CredexResult<Option<LedgerRecord>> {
        let state = self.lock()?;
        Ok(state.find_latest(object_type, id, at).cloned())
    }

    fn read_entries(
        &self,
        registry_id: &RevRegId,
        from: Option<Timestamp>,
        to: Timestamp,
    ) -> CredexResult<Vec<LedgerRecord>> {
        let state = self.lock()?;
        Ok(state
            .txns
            .iter()
            .filter(|r| {
                r.object_type == LedgerObjectType::RevocationRegistryEntry
                    && r.id == registry_id.as_str()
                    && from.map_or(true, |f| r.txn_time > f)
                    && r.txn_time <= to
            })
            .cloned()
            .collect())
    }
}
