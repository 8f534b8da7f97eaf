//! semvec vector store - embedding-backed semantic similarity search.
//!
//! Provides a record store with optional hash-field persistence, an exact
//! flat nearest-neighbor index, and `SemanticStore`, which ties both to an
//! embedding provider.

pub mod distance;
pub mod error;
pub mod index;
pub mod record;
pub mod semantic;
pub mod store;

pub use distance::DistanceMetric;
pub use error::{VectorDbError, Result};
pub use index::{FlatIndex, FlatIndexBuilder, IndexStrategy, Neighbor, QueryResult, SimilarityIndex};
pub use record::VectorRecord;
pub use semantic::SemanticStore;
pub use store::{FileKvStore, KvStore, MemoryKvStore, Snapshot, VectorRecordStore};
