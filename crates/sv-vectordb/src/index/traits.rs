use std::sync::Arc;

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::store::Snapshot;
use super::QueryResult;

/// Read-only nearest-neighbor structure over a fixed set of records.
///
/// An index never changes after it is built; new data means a new index.
pub trait SimilarityIndex: Send + Sync {
    /// The `k` records closest to `query`, or all of them if there are fewer.
    fn nearest(&self, query: &[f32], k: usize) -> Result<QueryResult>;

    /// Get the number of vectors in the index.
    fn len(&self) -> usize;

    /// Check if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the dimension of vectors in this index.
    fn dimension(&self) -> usize;

    /// Get the distance metric used.
    fn metric(&self) -> DistanceMetric;
}

/// Builds an index from a snapshot of the record store.
pub trait IndexStrategy: Send + Sync {
    fn build(&self, snapshot: Snapshot) -> Result<Arc<dyn SimilarityIndex>>;

    fn metric(&self) -> DistanceMetric;
}
