//! Record storage: the in-memory `VectorRecordStore` and its optional
//! hash-field backing stores (in-memory and file-based).

mod codec;
mod file_store;
mod kv;

pub use codec::{decode_vector, encode_vector};
pub use file_store::FileKvStore;
pub use kv::{Fields, KvStore, MemoryKvStore};

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, VectorDbError};
use crate::record::VectorRecord;

/// A vector waiting to be written: identifier, vector, optional source text.
pub type PendingRecord = (String, Vec<f32>, Option<String>);

struct Inner {
    records: Vec<Arc<VectorRecord>>,
    by_id: HashMap<String, usize>,
    dimension: Option<usize>,
    next_seq: u64,
}

/// Identifier -> vector mapping, kept in insertion order.
///
/// The first successful `put` fixes the store's dimension unless one was
/// given up front. When a backing [`KvStore`] is attached, every write goes
/// there first and memory is only updated once the backing write succeeded.
pub struct VectorRecordStore {
    inner: RwLock<Inner>,
    backing: Option<Arc<dyn KvStore>>,
    key_prefix: String,
}

impl VectorRecordStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: Vec::new(),
                by_id: HashMap::new(),
                dimension: None,
                next_seq: 0,
            }),
            backing: None,
            key_prefix: String::new(),
        }
    }

    /// Create an empty store whose dimension is fixed from the start.
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorDbError::InvalidArgument("dimension must be at least 1".into()));
        }
        let store = Self::new();
        store.inner.write().dimension = Some(dimension);
        Ok(store)
    }

    /// Open a store persisted in `backing` under `key_prefix`, recovering
    /// every record already there.
    pub fn open(backing: Arc<dyn KvStore>, key_prefix: impl Into<String>) -> Result<Self> {
        let key_prefix = key_prefix.into();
        let mut recovered = Vec::new();
        for key in backing.list_keys(&key_prefix)? {
            let Some(fields) = backing.get_fields(&key)? else {
                continue;
            };
            let id = &key[key_prefix.len()..];
            recovered.push(codec::decode_record(id, &fields)?);
        }
        recovered.sort_by_key(|r| r.seq());

        let mut inner = Inner {
            records: Vec::with_capacity(recovered.len()),
            by_id: HashMap::with_capacity(recovered.len()),
            dimension: None,
            next_seq: 0,
        };
        for record in recovered {
            match inner.dimension {
                Some(d) if d != record.dimension() => {
                    return Err(VectorDbError::Storage(format!(
                        "record {} has dimension {}, expected {d}",
                        record.id(),
                        record.dimension()
                    )));
                }
                _ => inner.dimension = Some(record.dimension()),
            }
            let after = record.seq().checked_add(1).ok_or_else(|| {
                VectorDbError::Storage(format!("record {} has an out-of-range seq", record.id()))
            })?;
            inner.next_seq = inner.next_seq.max(after);
            inner.by_id.insert(record.id().to_string(), inner.records.len());
            inner.records.push(Arc::new(record));
        }
        info!(
            prefix = %key_prefix,
            records = inner.records.len(),
            "Opened vector record store"
        );

        Ok(Self {
            inner: RwLock::new(inner),
            backing: Some(backing),
            key_prefix,
        })
    }

    /// Insert or replace the vector stored under `id`.
    pub fn put(&self, id: &str, vector: Vec<f32>) -> Result<()> {
        self.put_with_content(id, vector, None)
    }

    /// Like [`put`](Self::put), also keeping the text the vector came from.
    pub fn put_with_content(&self, id: &str, vector: Vec<f32>, content: Option<String>) -> Result<()> {
        let mut inner = self.inner.write();
        Self::validate(inner.dimension, id, &vector)?;
        self.commit(&mut inner, vec![(id.to_string(), vector, content)])
    }

    /// Write several records as one unit: either all of them land, in
    /// memory and in the backing store, or none do.
    pub fn put_many(&self, items: Vec<PendingRecord>) -> Result<()> {
        let mut inner = self.inner.write();
        let mut dimension = inner.dimension;
        for (id, vector, _) in &items {
            Self::validate(dimension, id, vector)?;
            dimension = Some(vector.len());
        }
        self.commit(&mut inner, items)
    }

    fn validate(dimension: Option<usize>, id: &str, vector: &[f32]) -> Result<()> {
        if id.is_empty() {
            return Err(VectorDbError::InvalidArgument("identifier cannot be empty".into()));
        }
        if vector.is_empty() {
            return Err(VectorDbError::InvalidArgument(format!("vector for {id} is empty")));
        }
        match dimension {
            Some(expected) if expected != vector.len() => Err(VectorDbError::DimensionMismatch {
                expected,
                got: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Stage validated items, persist them, then publish them to memory.
    fn commit(&self, inner: &mut Inner, items: Vec<PendingRecord>) -> Result<()> {
        let staged = Self::stage(inner, items)?;
        if let Some(backing) = &self.backing {
            for (written, record) in staged.iter().enumerate() {
                let key = self.key_for(record.id());
                if let Err(err) = backing.set_fields(&key, codec::encode_record(record)) {
                    self.roll_back(backing.as_ref(), inner, &staged[..written]);
                    return Err(err);
                }
            }
        }
        for record in staged {
            Self::install(inner, record);
        }
        Ok(())
    }

    /// Turn pending items into records with their final seq. A replaced id
    /// keeps its seq, including ids repeated within the same batch.
    fn stage(inner: &Inner, items: Vec<PendingRecord>) -> Result<Vec<VectorRecord>> {
        let mut fresh: HashMap<String, u64> = HashMap::new();
        let mut next_seq = inner.next_seq;
        let mut staged = Vec::with_capacity(items.len());
        for (id, vector, content) in items {
            let seq = match inner.by_id.get(&id) {
                Some(&idx) => inner.records[idx].seq(),
                None => match fresh.get(&id) {
                    Some(&seq) => seq,
                    None => {
                        let seq = next_seq;
                        next_seq = next_seq.checked_add(1).ok_or_else(|| {
                            VectorDbError::Storage("record sequence space exhausted".into())
                        })?;
                        fresh.insert(id.clone(), seq);
                        seq
                    }
                },
            };
            let mut record = VectorRecord::new(id, vector).with_seq(seq);
            if let Some(content) = content.filter(|c| !c.is_empty()) {
                record = record.with_content(content);
            }
            staged.push(record);
        }
        Ok(staged)
    }

    /// Undo backing writes of a batch that failed part way. Memory was not
    /// touched yet, so it still holds the previous version of every record.
    fn roll_back(&self, backing: &dyn KvStore, inner: &Inner, written: &[VectorRecord]) {
        for record in written.iter().rev() {
            let key = self.key_for(record.id());
            let restored = match inner.by_id.get(record.id()) {
                Some(&idx) => backing.set_fields(&key, codec::encode_record(&inner.records[idx])),
                None => backing.delete(&key).map(|_| ()),
            };
            if let Err(err) = restored {
                warn!(key = %key, error = %err, "Failed to roll back record write");
            }
        }
    }

    fn install(inner: &mut Inner, record: VectorRecord) {
        let dimension = record.dimension();
        let seq = record.seq();
        let existing = inner.by_id.get(record.id()).copied();
        debug!(id = record.id(), dimension, replaced = existing.is_some(), "Stored vector record");
        let record = Arc::new(record);
        match existing {
            Some(idx) => inner.records[idx] = record,
            None => {
                inner.by_id.insert(record.id().to_string(), inner.records.len());
                inner.records.push(record);
                inner.next_seq = inner.next_seq.max(seq.saturating_add(1));
            }
        }
        inner.dimension = Some(dimension);
    }

    pub fn get(&self, id: &str) -> Result<Arc<VectorRecord>> {
        let inner = self.inner.read();
        inner.by_id.get(id)
            .map(|&idx| Arc::clone(&inner.records[idx]))
            .ok_or_else(|| VectorDbError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().by_id.contains_key(id)
    }

    /// Delete the record under `id`. The established dimension is kept.
    pub fn remove(&self, id: &str) -> Result<Arc<VectorRecord>> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let idx = *inner.by_id.get(id)
            .ok_or_else(|| VectorDbError::NotFound(id.to_string()))?;
        if let Some(backing) = &self.backing {
            backing.delete(&self.key_for(id))?;
        }
        inner.by_id.remove(id);
        let removed = inner.records.remove(idx);
        for (pos, record) in inner.records.iter().enumerate().skip(idx) {
            inner.by_id.insert(record.id().to_string(), pos);
        }
        debug!(id, "Removed vector record");
        Ok(removed)
    }

    /// Snapshot of all records in insertion order.
    pub fn all(&self) -> Snapshot {
        Snapshot { records: self.inner.read().records.clone() }
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The dimension every record must have, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().dimension
    }

    fn key_for(&self, id: &str) -> String {
        format!("{}{id}", self.key_prefix)
    }
}

impl Default for VectorRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a store's records, in insertion order.
///
/// Iterating does not consume it and later writes to the store do not
/// show up in it.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<Arc<VectorRecord>>,
}

impl Snapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<VectorRecord>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Arc<VectorRecord>;
    type IntoIter = std::slice::Iter<'a, Arc<VectorRecord>>;
    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for Snapshot {
    type Item = Arc<VectorRecord>;
    type IntoIter = std::vec::IntoIter<Arc<VectorRecord>>;
    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
