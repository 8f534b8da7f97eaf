//! Distance metrics for nearest-neighbor search.
//!
//! Every metric is expressed as a distance: lower means closer.

use std::fmt;
use std::str::FromStr;

use crate::error::VectorDbError;

/// Supported distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance.
    #[default]
    L2,
    /// `1 - cosine_similarity`, in [0, 2].
    Cosine,
    /// Negated inner product.
    Ip,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L2 => write!(f, "l2"),
            Self::Cosine => write!(f, "cosine"),
            Self::Ip => write!(f, "ip"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = VectorDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Self::L2),
            "cosine" | "cos" => Ok(Self::Cosine),
            "ip" | "dot" | "inner_product" => Ok(Self::Ip),
            other => Err(VectorDbError::InvalidArgument(format!("unknown distance metric: {other}"))),
        }
    }
}

impl DistanceMetric {
    /// Distance between two equal-length vectors.
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => euclidean(a, b),
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Ip => -inner_product(a, b),
        }
    }
}

/// Compute inner product (dot product) of two vectors.
#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute L2 squared distance.
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| {
        let d = x - y;
        d * d
    }).sum()
}

#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    l2_squared(a, b).sqrt()
}

/// L2 norm of a vector.
#[inline]
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity (returns value in [-1, 1]).
/// A zero vector has similarity 0 with everything.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_from_parts(inner_product(a, b), norm(a), norm(b))
}

/// Cosine similarity from a precomputed dot product and norms.
#[inline]
pub fn cosine_from_parts(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
