//! Text-in, neighbors-out store composed from an embedding provider, a
//! record store and an index strategy.

use std::sync::Arc;
use parking_lot::Mutex;
use sv_core::{EmbedPurpose, EmbeddingProvider, SemanticConfig, StorageBackend};
use tracing::{debug, info, warn};

use crate::distance::DistanceMetric;
use crate::error::{Result, VectorDbError};
use crate::index::{FlatIndexBuilder, IndexStrategy, QueryResult, SimilarityIndex};
use crate::record::VectorRecord;
use crate::store::{FileKvStore, KvStore, Snapshot, VectorRecordStore};

/// Built index plus whether records changed since it was built.
struct IndexState {
    current: Option<Arc<dyn SimilarityIndex>>,
    dirty: bool,
}

/// Semantic search over named texts.
///
/// `ingest` embeds and stores a text and marks the index dirty; `query`
/// embeds the query text, rebuilds the index if dirty, and returns the
/// nearest stored records. Provider errors are never retried here.
pub struct SemanticStore {
    provider: Arc<dyn EmbeddingProvider>,
    records: VectorRecordStore,
    strategy: Box<dyn IndexStrategy>,
    /// Record writes happen while holding this lock, so the dirty flag can
    /// never lag behind the records.
    index: Mutex<IndexState>,
}

impl SemanticStore {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        records: VectorRecordStore,
        strategy: Box<dyn IndexStrategy>,
    ) -> Self {
        let dirty = !records.is_empty();
        Self {
            provider,
            records,
            strategy,
            index: Mutex::new(IndexState { current: None, dirty }),
        }
    }

    /// Build a store from configuration: metric, backing store and key
    /// prefix come from `config`, the embedding provider is supplied.
    pub fn from_config(config: &SemanticConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()
            .map_err(|e| VectorDbError::InvalidArgument(e.to_string()))?;
        if provider.dimension() != config.embedding.dimension {
            return Err(VectorDbError::DimensionMismatch {
                expected: config.embedding.dimension,
                got: provider.dimension(),
            });
        }
        let metric: DistanceMetric = config.index.metric.parse()?;
        let records = match config.storage.backend {
            StorageBackend::Memory => VectorRecordStore::new(),
            StorageBackend::File => {
                let path = config.storage.path.clone().ok_or_else(|| {
                    VectorDbError::InvalidArgument("file storage requires a path".into())
                })?;
                let backing: Arc<dyn KvStore> = Arc::new(FileKvStore::open(path)?);
                VectorRecordStore::open(backing, config.storage.key_prefix.clone())?
            }
        };
        if let Some(dim) = records.dimension() {
            if dim != provider.dimension() {
                return Err(VectorDbError::DimensionMismatch {
                    expected: dim,
                    got: provider.dimension(),
                });
            }
        }
        info!(
            model = provider.model_name(),
            dimension = provider.dimension(),
            %metric,
            records = records.len(),
            "Semantic store ready"
        );
        Ok(Self::new(provider, records, Box::new(FlatIndexBuilder::new(metric))))
    }

    /// In-memory store with a flat index under `metric`.
    pub fn in_memory(provider: Arc<dyn EmbeddingProvider>, metric: DistanceMetric) -> Self {
        Self::new(provider, VectorRecordStore::new(), Box::new(FlatIndexBuilder::new(metric)))
    }

    async fn embed(&self, text: &str, purpose: EmbedPurpose) -> Result<Vec<f32>> {
        self.provider.embed(text, purpose).await.map_err(|e| {
            warn!(error = %e, %purpose, "Embedding provider failed");
            VectorDbError::EmbeddingProvider(e)
        })
    }

    /// Embed `text` and store it under `id`, replacing any previous record.
    pub async fn ingest(&self, id: &str, text: &str) -> Result<()> {
        let vector = self.embed(text, EmbedPurpose::Document).await?;
        let mut state = self.index.lock();
        self.records.put_with_content(id, vector, Some(text.to_string()))?;
        state.dirty = true;
        debug!(id, "Ingested text");
        Ok(())
    }

    /// Ingest several texts. Nothing is stored unless every text embeds
    /// successfully, all vectors fit the store's dimension and the backing
    /// store accepts every write.
    pub async fn ingest_batch<I, S, T>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut pending = Vec::new();
        for (id, text) in items {
            let text: String = text.into();
            let vector = self.embed(&text, EmbedPurpose::Document).await?;
            pending.push((id.into(), vector, Some(text)));
        }
        let count = pending.len();
        if count == 0 {
            return Ok(0);
        }
        let mut state = self.index.lock();
        // A failed batch leaves the records untouched, so the flag stays put.
        self.records.put_many(pending)?;
        state.dirty = true;
        debug!(count, "Ingested batch");
        Ok(count)
    }

    /// The `k` stored records nearest to `text`.
    pub async fn query(&self, text: &str, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(VectorDbError::InvalidArgument("k must be at least 1".into()));
        }
        if self.records.is_empty() {
            return Err(VectorDbError::EmptyStore);
        }
        let vector = self.embed(text, EmbedPurpose::Query).await?;
        let index = self.current_index()?;
        let result = index.nearest(&vector, k)?;
        debug!(k, hits = result.len(), "Query answered");
        Ok(result)
    }

    /// The index to answer from, rebuilding first if records changed.
    fn current_index(&self) -> Result<Arc<dyn SimilarityIndex>> {
        let mut state = self.index.lock();
        if let (Some(index), false) = (&state.current, state.dirty) {
            return Ok(Arc::clone(index));
        }
        let snapshot = self.records.all();
        if snapshot.is_empty() {
            // Everything was removed between the emptiness check and here.
            return Err(VectorDbError::EmptyStore);
        }
        let index = self.strategy.build(snapshot)?;
        info!(records = index.len(), metric = %index.metric(), "Rebuilt similarity index");
        state.current = Some(Arc::clone(&index));
        state.dirty = false;
        Ok(index)
    }

    /// Drop the current index and build a fresh one. Having no index yet
    /// is fine; on an empty store this only drops the old index.
    pub fn rebuild_index(&self) -> Result<()> {
        let mut state = self.index.lock();
        let snapshot = self.records.all();
        state.current = if snapshot.is_empty() {
            None
        } else {
            let index = self.strategy.build(snapshot)?;
            info!(records = index.len(), "Recreated similarity index");
            Some(index)
        };
        state.dirty = false;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Arc<VectorRecord>> {
        self.records.get(id)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let mut state = self.index.lock();
        self.records.remove(id)?;
        state.dirty = true;
        Ok(())
    }

    /// All stored records in insertion order.
    pub fn all(&self) -> Snapshot {
        self.records.all()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.strategy.metric()
    }

    /// Whether the next query has to rebuild the index.
    pub fn is_index_stale(&self) -> bool {
        let state = self.index.lock();
        state.dirty || state.current.is_none()
    }
}
