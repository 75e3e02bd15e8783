use credex_core::{CredexError, CredexResult, SecureStore, StoreKey};
use std::collections::BTreeMap;
use std::sync::Mutex;
use subtle::ConstantTimeEq;

/// In-memory secure store.
///
/// Keys are kept ordered so prefix listing is a range scan.
pub struct InMemoryStore {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
}

fn lock_data(
    mutex: &Mutex<BTreeMap<String, Vec<u8>>>,
) -> CredexResult<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
    mutex
        .lock()
        .map_err(|e| CredexError::Storage(format!("lock poisoned: {}", e)))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of stored records.
    pub fn count(&self) -> usize {
        lock_data(&self.data).map(|d| d.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStore for InMemoryStore {
    fn get(&self, key: &StoreKey) -> CredexResult<Option<Vec<u8>>> {
        let data = lock_data(&self.data)?;
        Ok(data.get(key.as_str()).cloned())
    }

    fn put(&self, key: &StoreKey, value: &[u8]) -> CredexResult<()> {
        let mut data = lock_data(&self.data)?;
        data.insert(key.as_str().to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> CredexResult<bool> {
        let mut data = lock_data(&self.data)?;
        Ok(data.remove(key.as_str()).is_some())
    }

    fn list_prefix(&self, prefix: &str) -> CredexResult<Vec<StoreKey>> {
        let data = lock_data(&self.data)?;
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| StoreKey::new(k.clone()))
            .collect())
    }

    fn compare_and_swap(
        &self,
        key: &StoreKey,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> CredexResult<bool> {
        let mut data = lock_data(&self.data)?;
        let current = data.get(key.as_str());
        let matches = match (current, expected) {
            (None, None) => true,
            (Some(c), Some(e)) => c.as_slice().ct_eq(e).into(),
            _ => false,
        };
        if matches {
            data.insert(key.as_str().to_string(), new_value.to_vec());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn exists(&self, key: &StoreKey) -> CredexResult<bool> {
        let data = lock_data(&self.data)?;
        Ok(data.contains_key(key.as_str()))
    }
}
