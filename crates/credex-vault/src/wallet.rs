use crate::error::{VaultError, VaultResult};
use credex_core::{SecureStore, StoreKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Party-scoped view over a [`SecureStore`].
///
/// Records are JSON documents addressed as `{party}/{kind}::{id}`. Two
/// wallets over the same backing store never see each other's records
/// as long as their party names differ.
#[derive(Clone)]
pub struct Wallet {
    party: String,
    store: Arc<dyn SecureStore>,
}

impl Wallet {
    pub fn new(party: impl Into<String>, store: Arc<dyn SecureStore>) -> Self {
        Self {
            party: party.into(),
            store,
        }
    }

    pub fn party(&self) -> &str {
        &self.party
    }

    fn kind_prefix(&self, kind: &str) -> String {
        format!("{}/{}::", self.party, kind)
    }

    fn key(&self, kind: &str, id: &str) -> StoreKey {
        StoreKey(format!("{}{}", self.kind_prefix(kind), id))
    }

    /// Insert or overwrite a record.
    pub fn put_object<T: Serialize>(&self, kind: &str, id: &str, value: &T) -> VaultResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.put(&self.key(kind, id), &bytes)?;
        Ok(())
    }

    /// Insert a record that must not exist yet.
    pub fn add_object<T: Serialize>(&self, kind: &str, id: &str, value: &T) -> VaultResult<()> {
        let bytes = serde_json::to_vec(value)?;
        if self.store.compare_and_swap(&self.key(kind, id), None, &bytes)? {
            Ok(())
        } else {
            tracing::debug!(party = %self.party, kind, id, "record already exists");
            Err(VaultError::AlreadyExists(format!("{}::{}", kind, id)))
        }
    }

    pub fn get_object<T: DeserializeOwned>(&self, kind: &str, id: &str) -> VaultResult<T> {
        self.get_opt_object(kind, id)?
            .ok_or_else(|| VaultError::NotFound(format!("{}::{}", kind, id)))
    }

    pub fn get_opt_object<T: DeserializeOwned>(
        &self,
        kind: &str,
        id: &str,
    ) -> VaultResult<Option<T>> {
        match self.store.get(&self.key(kind, id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn has_object(&self, kind: &str, id: &str) -> VaultResult<bool> {
        Ok(self.store.exists(&self.key(kind, id))?)
    }

    /// All records of one kind as `(id, value)` pairs, ordered by id.
    pub fn list_objects<T: DeserializeOwned>(&self, kind: &str) -> VaultResult<Vec<(String, T)>> {
        let prefix = self.kind_prefix(kind);
        let mut out = Vec::new();
        for key in self.store.list_prefix(&prefix)? {
            let id = key.as_str()[prefix.len()..].to_string();
            if let Some(bytes) = self.store.get(&key)? {
                out.push((id, serde_json::from_slice(&bytes)?));
            }
        }
        Ok(out)
    }

    pub fn delete_object(&self, kind: &str, id: &str) -> VaultResult<bool> {
        Ok(self.store.delete(&self.key(kind, id))?)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("party", &self.party).finish()
    }
}
