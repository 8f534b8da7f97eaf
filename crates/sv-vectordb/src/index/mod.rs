//! Nearest-neighbor indexes built from record snapshots.

mod flat;
mod traits;

pub use flat::{FlatIndex, FlatIndexBuilder};
pub use traits::{IndexStrategy, SimilarityIndex};

/// One hit of a nearest-neighbor query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub distance: f32,
}

/// Hits ordered by ascending distance, ties by ascending identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub neighbors: Vec<Neighbor>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self { neighbors: vec![] }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Neighbor> {
        self.neighbors.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.neighbors.iter().map(|n| n.id.as_str()).collect()
    }
}

impl IntoIterator for QueryResult {
    type Item = Neighbor;
    type IntoIter = std::vec::IntoIter<Neighbor>;
    fn into_iter(self) -> Self::IntoIter {
        self.neighbors.into_iter()
    }
}
