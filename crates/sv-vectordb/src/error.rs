use sv_core::SvError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Cannot build an index from zero records")]
    EmptyInput,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Store has no records")]
    EmptyStore,
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(#[source] SvError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VectorDbError>;
