use crate::error::CredexResult;
use crate::types::{Digest32, LedgerObjectType, RevRegId, SeqNo, StoreKey, Timestamp};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SecureStore: per-party durable keyed storage
//
// Each party (issuer, prover) owns its own store. Nothing in the protocol
// reads another party's store.
// ---------------------------------------------------------------------------

pub trait SecureStore: Send + Sync {
    fn get(&self, key: &StoreKey) -> CredexResult<Option<Vec<u8>>>;
    fn put(&self, key: &StoreKey, value: &[u8]) -> CredexResult<()>;
    fn delete(&self, key: &StoreKey) -> CredexResult<bool>;

    /// All keys starting with `prefix`, in ascending order.
    fn list_prefix(&self, prefix: &str) -> CredexResult<Vec<StoreKey>>;

    /// Atomic compare-and-swap. Returns true if the swap happened.
    fn compare_and_swap(
        &self,
        key: &StoreKey,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> CredexResult<bool>;

    fn exists(&self, key: &StoreKey) -> CredexResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

// ---------------------------------------------------------------------------
// LedgerClient: append-only public store shared by all parties
//
// Reads are monotonic per id: a later read never returns an older seq_no.
// ---------------------------------------------------------------------------

pub trait LedgerClient: Send + Sync {
    /// Publish an object. Immutable objects are idempotent on identical
    /// payloads; registry entries append.
    fn publish(
        &self,
        object_type: LedgerObjectType,
        id: &str,
        payload: &serde_json::Value,
    ) -> CredexResult<SeqNo>;

    /// Latest record for `id` written at or before `at` (or the latest
    /// overall when `at` is `None`).
    fn read(
        &self,
        object_type: LedgerObjectType,
        id: &str,
        at: Option<Timestamp>,
    ) -> CredexResult<Option<LedgerRecord>>;

    /// Registry entries with `from < txn_time <= to`, oldest first. A `from`
    /// of `None` starts at the registry genesis.
    fn read_entries(
        &self,
        registry_id: &RevRegId,
        from: Option<Timestamp>,
        to: Timestamp,
    ) -> CredexResult<Vec<LedgerRecord>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub object_type: LedgerObjectType,
    pub id: String,
    pub payload: serde_json::Value,
    pub seq_no: SeqNo,
    pub txn_time: Timestamp,
    /// Hash of this transaction, chained over the previous one.
    pub hash: Digest32,
}

impl LedgerRecord {
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> CredexResult<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

// ---------------------------------------------------------------------------
// Clock: source of ledger transaction time
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
