use credex_core::{CredexError, CredexResult, SecureStore, StoreKey};
use rusqlite::{params, Connection};
use std::sync::Mutex;
use subtle::ConstantTimeEq;

/// SQLite-backed secure store. One table of opaque key/value records.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn storage_err(context: &str, e: rusqlite::Error) -> CredexError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            CredexError::Unavailable(format!("{}: {}", context, e))
        }
        other => CredexError::Storage(format!("{}: {}", context, other)),
    }
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &str) -> CredexResult<Self> {
        let conn =
            Connection::open(path).map_err(|e| storage_err("failed to open database", e))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at TEXT DEFAULT (datetime('now'))
            );",
        )
        .map_err(|e| storage_err("failed to create tables", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> CredexResult<Self> {
        Self::open(":memory:")
    }

    fn lock(&self) -> CredexResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CredexError::Storage(format!("lock poisoned: {}", e)))
    }
}

fn read_value(conn: &Connection, key: &StoreKey) -> CredexResult<Option<Vec<u8>>> {
    let result: Result<Vec<u8>, _> = conn.query_row(
        "SELECT value FROM records WHERE key = ?1",
        params![key.as_str()],
        |row| row.get(0),
    );
    match result {
        Ok(data) => Ok(Some(data)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(storage_err("query failed", e)),
    }
}

fn write_value(conn: &Connection, key: &StoreKey, value: &[u8]) -> CredexResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO records (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
        params![key.as_str(), value],
    )
    .map_err(|e| storage_err("insert failed", e))?;
    Ok(())
}

impl SecureStore for SqliteStore {
    fn get(&self, key: &StoreKey) -> CredexResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        read_value(&conn, key)
    }

    fn put(&self, key: &StoreKey, value: &[u8]) -> CredexResult<()> {
        let conn = self.lock()?;
        write_value(&conn, key, value)
    }

    fn delete(&self, key: &StoreKey) -> CredexResult<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute("DELETE FROM records WHERE key = ?1", params![key.as_str()])
            .map_err(|e| storage_err("delete failed", e))?;
        Ok(rows > 0)
    }

    fn list_prefix(&self, prefix: &str) -> CredexResult<Vec<StoreKey>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key FROM records WHERE key >= ?1 ORDER BY key")
            .map_err(|e| storage_err("prepare failed", e))?;
        let rows = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))
            .map_err(|e| storage_err("list failed", e))?;

        let mut keys = Vec::new();
        for row in rows {
            let key = row.map_err(|e| storage_err("row read failed", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(StoreKey::new(key));
        }
        Ok(keys)
    }

    fn compare_and_swap(
        &self,
        key: &StoreKey,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> CredexResult<bool> {
        let conn = self.lock()?;
        let current = read_value(&conn, key)?;
        let matches = match (&current, expected) {
            (None, None) => true,
            (Some(curr), Some(exp)) => curr.as_slice().ct_eq(exp).into(),
            _ => false,
        };
        if matches {
            write_value(&conn, key, new_value)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[test]
    fn test_get_nonexistent() {
        let store = test_store();
        assert!(store.get(&StoreKey::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrite_and_delete() {
        let store = test_store();
        let key = StoreKey::new("prover/credential::1");

        store.put(&key, b"data-1").unwrap();
        store.put(&key, b"data-2").unwrap();
        assert_eq!(store.get(&key).unwrap().unwrap(), b"data-2");
        assert!(store.exists(&key).unwrap());

        assert!(store.delete(&key).unwrap());
        assert!(!store.delete(&key).unwrap());
    }

    #[test]
    fn test_list_prefix() {
        let store = test_store();
        for key in ["p/cred::b", "p/cred::a", "p/req::a", "q/cred::a"] {
            store.put(&StoreKey::new(key), b"v").unwrap();
        }
        let keys: Vec<String> = store
            .list_prefix("p/cred::")
            .unwrap()
            .into_iter()
            .map(|k| k.0)
            .collect();
        assert_eq!(keys, vec!["p/cred::a".to_string(), "p/cred::b".to_string()]);
    }

    #[test]
    fn test_cas() {
        let store = test_store();
        let key = StoreKey::new("cas");
        assert!(store.compare_and_swap(&key, None, b"v1").unwrap());
        assert!(!store.compare_and_swap(&key, None, b"v2").unwrap());
        assert!(store.compare_and_swap(&key, Some(b"v1"), b"v2").unwrap());
        assert_eq!(store.get(&key).unwrap().unwrap(), b"v2");
    }
}
