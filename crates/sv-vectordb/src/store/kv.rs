use std::collections::BTreeMap;
use parking_lot::RwLock;

use crate::error::Result;

/// Field name -> raw bytes, the value shape of one hash key.
pub type Fields = BTreeMap<String, Vec<u8>>;

/// Hash-field key/value store used to persist records.
pub trait KvStore: Send + Sync {
    /// Merge `fields` into the hash at `key`, creating it if needed.
    fn set_fields(&self, key: &str, fields: Fields) -> Result<()>;
    fn get_fields(&self, key: &str) -> Result<Option<Fields>>;
    /// Keys starting with `prefix`, sorted.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> Result<bool>;
}

/// In-memory KV store.
pub struct MemoryKvStore {
    data: RwLock<BTreeMap<String, Fields>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self { data: RwLock::new(BTreeMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self { Self::new() }
}

impl KvStore for MemoryKvStore {
    fn set_fields(&self, key: &str, fields: Fields) -> Result<()> {
        self.data.write().entry(key.to_string()).or_default().extend(fields);
        Ok(())
    }

    fn get_fields(&self, key: &str) -> Result<Option<Fields>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.data.read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().remove(key).is_some())
    }
}
