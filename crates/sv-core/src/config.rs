use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SvError};

/// Metric names understood by the vector index.
pub const METRIC_NAMES: &[&str] = &["l2", "euclidean", "cosine", "cos", "ip", "dot", "inner_product"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".into(),
            model: "feature-hash-v1".into(),
            dimension: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub metric: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { metric: "l2".into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            key_prefix: "doc:".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl SemanticConfig {
    /// Load a JSON config file. Missing sections fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Defaults overridden by `SEMVEC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `SEMVEC_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("SEMVEC_EMBEDDING_PROVIDER") {
            self.embedding.provider = v;
        }
        if let Some(v) = lookup("SEMVEC_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = lookup("SEMVEC_EMBEDDING_DIMENSION") {
            self.embedding.dimension = v.parse().map_err(|_| {
                SvError::InvalidConfig(format!("SEMVEC_EMBEDDING_DIMENSION is not a number: {v}"))
            })?;
        }
        if let Some(v) = lookup("SEMVEC_INDEX_METRIC") {
            self.index.metric = v;
        }
        if let Some(v) = lookup("SEMVEC_STORAGE_BACKEND") {
            self.storage.backend = match v.to_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "file" => StorageBackend::File,
                other => {
                    return Err(SvError::InvalidConfig(format!("unknown storage backend: {other}")))
                }
            };
        }
        if let Some(v) = lookup("SEMVEC_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SEMVEC_KEY_PREFIX") {
            self.storage.key_prefix = v;
        }
        if let Some(v) = lookup("SEMVEC_LOG_LEVEL") {
            self.logging.level = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(SvError::InvalidConfig("embedding dimension cannot be 0".into()));
        }
        if self.embedding.provider.is_empty() {
            return Err(SvError::InvalidConfig("embedding provider cannot be empty".into()));
        }
        let metric = self.index.metric.to_lowercase();
        if !METRIC_NAMES.contains(&metric.as_str()) {
            return Err(SvError::InvalidConfig(format!(
                "unknown distance metric: {}",
                self.index.metric
            )));
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(SvError::InvalidConfig("file storage requires a path".into()));
        }
        if self.storage.key_prefix.is_empty() {
            return Err(SvError::InvalidConfig("key prefix cannot be empty".into()));
        }
        Ok(())
    }
}
