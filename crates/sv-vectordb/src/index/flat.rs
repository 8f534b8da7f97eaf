use std::collections::BinaryHeap;
use std::sync::Arc;
use ordered_float::OrderedFloat;

use crate::distance::{self, DistanceMetric};
use crate::error::{Result, VectorDbError};
use crate::record::VectorRecord;
use crate::store::Snapshot;
use super::{IndexStrategy, Neighbor, QueryResult, SimilarityIndex};

/// Brute-force (flat) vector index.
/// Exact nearest-neighbor search by scanning all vectors.
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    records: Vec<Arc<VectorRecord>>,
    /// Per-record L2 norms, only filled for cosine.
    norms: Vec<f32>,
}

impl FlatIndex {
    /// Build from a finite sequence of records sharing one dimension.
    pub fn build<I>(records: I, metric: DistanceMetric) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<VectorRecord>>,
    {
        let records: Vec<Arc<VectorRecord>> = records.into_iter().collect();
        let Some(first) = records.first() else {
            return Err(VectorDbError::EmptyInput);
        };
        let dimension = first.dimension();
        if let Some(bad) = records.iter().find(|r| r.dimension() != dimension) {
            return Err(VectorDbError::DimensionMismatch {
                expected: dimension,
                got: bad.dimension(),
            });
        }
        let norms = if metric == DistanceMetric::Cosine {
            records.iter().map(|r| distance::norm(r.vector())).collect()
        } else {
            Vec::new()
        };
        Ok(Self { dimension, metric, records, norms })
    }

    fn distance_at(&self, idx: usize, query: &[f32], query_norm: f32) -> f32 {
        let vector = self.records[idx].vector();
        match self.metric {
            DistanceMetric::Cosine => {
                let dot = distance::inner_product(query, vector);
                1.0 - distance::cosine_from_parts(dot, query_norm, self.norms[idx])
            }
            metric => metric.distance(query, vector),
        }
    }
}

impl SimilarityIndex for FlatIndex {
    fn nearest(&self, query: &[f32], k: usize) -> Result<QueryResult> {
        if query.len() != self.dimension {
            return Err(VectorDbError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if k == 0 {
            return Err(VectorDbError::InvalidArgument("k must be at least 1".into()));
        }

        let query_norm = if self.metric == DistanceMetric::Cosine {
            distance::norm(query)
        } else {
            0.0
        };

        // Max-heap on (distance, id): the root is the worst of the current best k.
        let mut heap: BinaryHeap<(OrderedFloat<f32>, &str)> = BinaryHeap::with_capacity(k + 1);
        for (idx, record) in self.records.iter().enumerate() {
            let candidate = (OrderedFloat(self.distance_at(idx, query, query_norm)), record.id());
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        let neighbors = heap.into_sorted_vec()
            .into_iter()
            .map(|(d, id)| Neighbor { id: id.to_string(), distance: d.into_inner() })
            .collect();
        Ok(QueryResult { neighbors })
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

/// Strategy producing a [`FlatIndex`] per snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatIndexBuilder {
    metric: DistanceMetric,
}

impl FlatIndexBuilder {
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }
}

impl IndexStrategy for FlatIndexBuilder {
    fn build(&self, snapshot: Snapshot) -> Result<Arc<dyn SimilarityIndex>> {
        Ok(Arc::new(FlatIndex::build(snapshot, self.metric)?))
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
