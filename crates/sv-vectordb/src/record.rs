use std::sync::Arc;

/// A named vector. Immutable: replacing a record means putting a new one
/// under the same identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    id: String,
    vector: Arc<[f32]>,
    content: Option<String>,
    seq: u64,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector: vector.into(),
            content: None,
            seq: 0,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub(crate) fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Source text the vector was computed from, if it was kept.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Insertion position within the owning store.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}
