use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorDbError};
use super::kv::{Fields, KvStore};

/// On-disk layout of one hash.
#[derive(Debug, Serialize, Deserialize)]
struct HashFile {
    key: String,
    fields: Fields,
}

/// File-backed KV store: one JSON file per key, written atomically.
///
/// File names are the hex encoding of the key, so any key is safe to store.
pub struct FileKvStore {
    base_path: PathBuf,
    /// Serialises read-modify-write of `set_fields`.
    write_lock: Mutex<()>,
}

impl FileKvStore {
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path, write_lock: Mutex::new(()) })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", hex_encode(key)))
    }

    fn read_hash(&self, path: &Path) -> Result<Option<HashFile>> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| VectorDbError::Serialization(format!("{}: {e}", path.display())))
    }

    fn write_atomic(&self, path: &Path, value: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let result = (|| -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(value)?;
            f.flush()?;
            f.sync_all()?;
            fs::rename(&tmp_path, path)?;
            Ok(())
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl KvStore for FileKvStore {
    fn set_fields(&self, key: &str, fields: Fields) -> Result<()> {
        let _guard = self.write_lock.lock();
        let path = self.resolve_path(key);
        let mut hash = self.read_hash(&path)?.unwrap_or_else(|| HashFile {
            key: key.to_string(),
            fields: Fields::new(),
        });
        hash.fields.extend(fields);
        let bytes = serde_json::to_vec(&hash)
            .map_err(|e| VectorDbError::Serialization(e.to_string()))?;
        self.write_atomic(&path, &bytes)
    }

    fn get_fields(&self, key: &str) -> Result<Option<Fields>> {
        Ok(self.read_hash(&self.resolve_path(key))?.map(|h| h.fields))
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem()
                .and_then(|s| s.to_str())
                .and_then(hex_decode)
            else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.resolve_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn hex_encode(s: &str) -> String {
    s.bytes().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<String> {
    if s.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        for key in ["doc:1", "", "fact/ü ☃"] {
            assert_eq!(hex_decode(&hex_encode(key)).as_deref(), Some(key));
        }
        assert!(hex_decode("abc").is_none());
        assert!(hex_decode("zz").is_none());
    }
}
