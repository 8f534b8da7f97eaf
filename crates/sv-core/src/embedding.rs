//! Embedding provider capability and a deterministic offline provider.

use async_trait::async_trait;

use crate::error::{Result, SvError};
use crate::types::EmbedPurpose;

/// Turns text into a fixed-length vector.
///
/// Every call on one provider returns vectors of [`dimension`](Self::dimension)
/// length. Failures (transport, quota, auth) are returned as-is; callers
/// decide whether to retry.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, purpose: EmbedPurpose) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str {
        "unknown"
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Feature-hashing embedder: each lowercase alphanumeric token is hashed
/// into a signed bucket and the result is L2-normalised.
///
/// Texts sharing vocabulary land close together, which is enough for
/// demos and tests without a network round trip.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(SvError::InvalidConfig("embedding dimension cannot be 0".into()));
        }
        Ok(Self {
            dimension,
            model: "feature-hash-v1".into(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn hash_token(token: &str) -> u64 {
        token.bytes().fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
    }

    /// Synchronous core of [`EmbeddingProvider::embed`].
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let h = Self::hash_token(token);
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str, _purpose: EmbedPurpose) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
