//! End-to-end tests for SemanticStore with scripted embedding providers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use sv_core::{EmbedPurpose, EmbeddingProvider, HashingEmbedder, SemanticConfig, StorageBackend, SvError};
use sv_vectordb::{
    store::Fields, DistanceMetric, FlatIndexBuilder, KvStore, MemoryKvStore, SemanticStore,
    VectorDbError, VectorRecordStore,
};
use tempfile::TempDir;

/// Returns a fixed vector per text; can be switched into failure mode.
struct ScriptedProvider {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
    failing: AtomicBool,
    calls: AtomicUsize,
    purposes: parking_lot::Mutex<Vec<EmbedPurpose>>,
}

impl ScriptedProvider {
    fn new(dimension: usize, pairs: Vec<(&str, Vec<f32>)>) -> Arc<Self> {
        Arc::new(Self {
            vectors: pairs.into_iter().map(|(t, v)| (t.to_string(), v)).collect(),
            dimension,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            purposes: parking_lot::Mutex::new(Vec::new()),
        })
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedProvider {
    async fn embed(&self, text: &str, purpose: EmbedPurpose) -> sv_core::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.purposes.lock().push(purpose);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SvError::Unavailable("connection reset by peer".into()));
        }
        self.vectors.get(text)
            .cloned()
            .ok_or_else(|| SvError::Embedding(format!("no vector scripted for {text:?}")))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Memory backing that fails one chosen write (1-based) and, on demand,
/// every delete.
struct FailingKv {
    inner: MemoryKvStore,
    writes: AtomicUsize,
    failing_write: usize,
    fail_deletes: AtomicBool,
}

impl FailingKv {
    fn failing_on_write(failing_write: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryKvStore::new(),
            writes: AtomicUsize::new(0),
            failing_write,
            fail_deletes: AtomicBool::new(false),
        })
    }
}

impl KvStore for FailingKv {
    fn set_fields(&self, key: &str, fields: Fields) -> sv_vectordb::Result<()> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.failing_write {
            return Err(VectorDbError::Storage("disk full".into()));
        }
        self.inner.set_fields(key, fields)
    }

    fn get_fields(&self, key: &str) -> sv_vectordb::Result<Option<Fields>> {
        self.inner.get_fields(key)
    }

    fn list_keys(&self, prefix: &str) -> sv_vectordb::Result<Vec<String>> {
        self.inner.list_keys(prefix)
    }

    fn delete(&self, key: &str) -> sv_vectordb::Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(VectorDbError::Storage("read-only filesystem".into()));
        }
        self.inner.delete(key)
    }
}

fn backed_store(provider: Arc<ScriptedProvider>, kv: Arc<FailingKv>) -> SemanticStore {
    SemanticStore::new(
        provider,
        VectorRecordStore::open(kv, "doc:").unwrap(),
        Box::new(FlatIndexBuilder::new(DistanceMetric::L2)),
    )
}

fn abc_provider() -> Arc<ScriptedProvider> {
    ScriptedProvider::new(2, vec![
        ("alpha", vec![0.0, 0.0]),
        ("bravo", vec![3.0, 4.0]),
        ("charlie", vec![1.0, 1.0]),
        ("origin", vec![0.0, 0.0]),
        ("far corner", vec![3.0, 3.9]),
        ("wide", vec![1.0, 2.0, 3.0]),
        ("some text", vec![5.0, 5.0]),
    ])
}

async fn abc_store(provider: Arc<ScriptedProvider>) -> SemanticStore {
    let store = SemanticStore::in_memory(provider, DistanceMetric::L2);
    store.ingest("A", "alpha").await.unwrap();
    store.ingest("B", "bravo").await.unwrap();
    store.ingest("C", "charlie").await.unwrap();
    store
}

#[tokio::test]
async fn test_query_nearest_two() {
    let store = abc_store(abc_provider()).await;
    let result = store.query("origin", 2).await.unwrap();
    assert_eq!(result.ids(), vec!["A", "C"]);
    assert_eq!(result.neighbors[0].distance, 0.0);
    assert!((result.neighbors[1].distance - 2f32.sqrt()).abs() < 1e-6);
}

#[tokio::test]
async fn test_query_empty_store() {
    let provider = abc_provider();
    let store = SemanticStore::in_memory(provider.clone(), DistanceMetric::L2);
    assert!(matches!(store.query("origin", 3).await, Err(VectorDbError::EmptyStore)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_query_rejects_zero_k() {
    let store = abc_store(abc_provider()).await;
    assert!(matches!(store.query("origin", 0).await, Err(VectorDbError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_ingest_provider_failure_leaves_store_unchanged() {
    let provider = abc_provider();
    let store = abc_store(provider.clone()).await;
    store.query("origin", 1).await.unwrap();
    assert!(!store.is_index_stale());

    provider.set_failing(true);
    let err = store.ingest("X", "some text").await.unwrap_err();
    match &err {
        VectorDbError::EmbeddingProvider(SvError::Unavailable(msg)) => {
            assert!(msg.contains("connection reset"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(store.len(), 3);
    assert!(matches!(store.get("X"), Err(VectorDbError::NotFound(_))));
    assert!(!store.is_index_stale());

    provider.set_failing(false);
    store.ingest("X", "some text").await.unwrap();
    assert!(store.is_index_stale());
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn test_query_provider_failure_is_not_retried() {
    let provider = abc_provider();
    let store = abc_store(provider.clone()).await;
    provider.set_failing(true);
    let before = provider.calls();
    assert!(matches!(
        store.query("origin", 1).await,
        Err(VectorDbError::EmbeddingProvider(_))
    ));
    assert_eq!(provider.calls(), before + 1);
}

#[tokio::test]
async fn test_ingest_dimension_mismatch() {
    let store = abc_store(abc_provider()).await;
    assert!(matches!(
        store.ingest("W", "wide").await,
        Err(VectorDbError::DimensionMismatch { expected: 2, got: 3 })
    ));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_purposes_passed_to_provider() {
    let provider = abc_provider();
    let store = abc_store(provider.clone()).await;
    store.query("origin", 1).await.unwrap();
    let purposes = provider.purposes.lock().clone();
    assert_eq!(
        purposes,
        vec![EmbedPurpose::Document, EmbedPurpose::Document, EmbedPurpose::Document, EmbedPurpose::Query]
    );
}

#[tokio::test]
async fn test_dirty_index_rebuilt_on_query() {
    let store = abc_store(abc_provider()).await;
    assert!(store.is_index_stale());
    let first = store.query("far corner", 1).await.unwrap();
    assert_eq!(first.ids(), vec!["B"]);
    assert!(!store.is_index_stale());

    // Replacing B moves it away; the next query has to see the new vector.
    store.ingest("B", "alpha").await.unwrap();
    assert!(store.is_index_stale());
    let second = store.query("far corner", 1).await.unwrap();
    assert_eq!(second.ids(), vec!["C"]);
    assert_eq!(store.get("B").unwrap().content(), Some("alpha"));
}

#[tokio::test]
async fn test_remove_marks_dirty() {
    let store = abc_store(abc_provider()).await;
    store.query("origin", 1).await.unwrap();
    store.remove("A").unwrap();
    assert!(store.is_index_stale());
    let result = store.query("origin", 5).await.unwrap();
    assert_eq!(result.ids(), vec!["C", "B"]);
    assert!(matches!(store.remove("A"), Err(VectorDbError::NotFound(_))));

    store.remove("B").unwrap();
    store.remove("C").unwrap();
    assert!(matches!(store.query("origin", 1).await, Err(VectorDbError::EmptyStore)));
}

#[tokio::test]
async fn test_rebuild_index_is_idempotent() {
    let provider = abc_provider();
    let empty = SemanticStore::in_memory(provider.clone(), DistanceMetric::L2);
    empty.rebuild_index().unwrap();
    empty.rebuild_index().unwrap();

    let store = abc_store(provider).await;
    store.rebuild_index().unwrap();
    assert!(!store.is_index_stale());
    let a = store.query("far corner", 3).await.unwrap();
    store.rebuild_index().unwrap();
    let b = store.query("far corner", 3).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_ingest_batch_all_or_nothing() {
    let provider = abc_provider();
    let store = SemanticStore::in_memory(provider.clone(), DistanceMetric::L2);

    let err = store.ingest_batch(vec![("A", "alpha"), ("Q", "unscripted")]).await;
    assert!(matches!(err, Err(VectorDbError::EmbeddingProvider(SvError::Embedding(_)))));
    assert!(store.is_empty());

    let err = store.ingest_batch(vec![("A", "alpha"), ("W", "wide")]).await;
    assert!(matches!(err, Err(VectorDbError::DimensionMismatch { .. })));
    assert!(store.is_empty());

    let n = store.ingest_batch(vec![("A", "alpha"), ("B", "bravo"), ("C", "charlie")]).await.unwrap();
    assert_eq!(n, 3);
    let ids: Vec<String> = store.all().iter().map(|r| r.id().to_string()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert_eq!(store.ingest_batch(Vec::<(String, String)>::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_queries_share_index() {
    let store = Arc::new(abc_store(abc_provider()).await);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.query("origin", 2).await.unwrap().ids().iter().map(|s| s.to_string()).collect::<Vec<_>>()
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), vec!["A", "C"]);
    }
}

#[tokio::test]
async fn test_cosine_strategy() {
    let provider = ScriptedProvider::new(2, vec![
        ("east", vec![1.0, 0.0]),
        ("far east", vec![100.0, 0.0]),
        ("north", vec![0.0, 1.0]),
        ("query", vec![1.0, 0.0]),
    ]);
    let store = SemanticStore::new(
        provider,
        VectorRecordStore::new(),
        Box::new(FlatIndexBuilder::new(DistanceMetric::Cosine)),
    );
    assert_eq!(store.metric(), DistanceMetric::Cosine);
    store.ingest("e", "east").await.unwrap();
    store.ingest("fe", "far east").await.unwrap();
    store.ingest("n", "north").await.unwrap();
    let result = store.query("query", 3).await.unwrap();
    // Same direction ties on distance and falls back to identifier order.
    assert_eq!(result.ids(), vec!["e", "fe", "n"]);
}

#[tokio::test]
async fn test_from_config_file_backend_recovers() {
    let dir = TempDir::new().unwrap();
    let mut config = SemanticConfig::default();
    config.storage.backend = StorageBackend::File;
    config.storage.path = Some(dir.path().join("store"));

    {
        let provider = Arc::new(HashingEmbedder::new(256).unwrap());
        let store = SemanticStore::from_config(&config, provider).unwrap();
        store.ingest("rust", "Rust guarantees memory safety").await.unwrap();
        store.ingest("tower", "The Eiffel Tower is in Paris").await.unwrap();
    }

    let provider = Arc::new(HashingEmbedder::new(256).unwrap());
    let store = SemanticStore::from_config(&config, provider).unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.is_index_stale());
    let result = store.query("where is the Eiffel Tower", 1).await.unwrap();
    assert_eq!(result.ids(), vec!["tower"]);
    assert_eq!(store.get("rust").unwrap().content(), Some("Rust guarantees memory safety"));
}

#[tokio::test]
async fn test_from_config_rejects_provider_dimension() {
    let config = SemanticConfig::default();
    let provider = Arc::new(HashingEmbedder::new(8).unwrap());
    assert!(matches!(
        SemanticStore::from_config(&config, provider),
        Err(VectorDbError::DimensionMismatch { expected: 256, got: 8 })
    ));
}

#[tokio::test]
async fn test_ingest_batch_storage_failure_keeps_index_consistent() {
    let kv = FailingKv::failing_on_write(3);
    let store = backed_store(abc_provider(), kv.clone());
    store.ingest("A", "alpha").await.unwrap();
    assert_eq!(store.query("far corner", 1).await.unwrap().ids(), vec!["A"]);
    assert!(!store.is_index_stale());

    let err = store.ingest_batch(vec![("B", "bravo"), ("C", "charlie")]).await;
    assert!(matches!(err, Err(VectorDbError::Storage(_))));
    assert_eq!(store.len(), 1);
    assert!(matches!(store.get("B"), Err(VectorDbError::NotFound(_))));
    assert_eq!(kv.list_keys("doc:").unwrap(), vec!["doc:A"]);
    // Nothing changed, so the clean index is still accurate.
    assert!(!store.is_index_stale());
    assert_eq!(store.query("far corner", 3).await.unwrap().ids(), vec!["A"]);

    store.ingest_batch(vec![("B", "bravo"), ("C", "charlie")]).await.unwrap();
    assert!(store.is_index_stale());
    assert_eq!(store.query("far corner", 1).await.unwrap().ids(), vec!["B"]);
}

#[tokio::test]
async fn test_remove_storage_failure_keeps_record_queryable() {
    let kv = FailingKv::failing_on_write(0);
    let store = backed_store(abc_provider(), kv.clone());
    store.ingest("A", "alpha").await.unwrap();
    store.ingest("C", "charlie").await.unwrap();
    store.query("origin", 1).await.unwrap();

    kv.fail_deletes.store(true, Ordering::SeqCst);
    assert!(matches!(store.remove("A"), Err(VectorDbError::Storage(_))));
    assert!(!store.is_index_stale());
    assert_eq!(store.query("origin", 2).await.unwrap().ids(), vec!["A", "C"]);

    kv.fail_deletes.store(false, Ordering::SeqCst);
    store.remove("A").unwrap();
    assert!(store.is_index_stale());
    assert_eq!(store.query("origin", 2).await.unwrap().ids(), vec!["C"]);
}
