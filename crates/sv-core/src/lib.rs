pub mod config;
pub mod embedding;
pub mod error;
pub mod types;

pub use config::{SemanticConfig, StorageBackend};
pub use embedding::{EmbeddingProvider, HashingEmbedder};
pub use error::{Result, SvError};
pub use types::EmbedPurpose;
