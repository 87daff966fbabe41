//! Embedding generator seams and the deterministic hashed fallback.
//!
//! The real generators (model-backed dense embeddings, BM25 sparse vectors
//! from a fitted corpus) are external collaborators; the traits here are
//! their seam. The hashed implementations below need no model files, are
//! fully deterministic, and back the in-memory index used by the default
//! wiring and the test suite.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use crate::error::SearchError;

/// Default dimensionality of the hashed dense embedding.
pub const DEFAULT_DENSE_DIMENSION: usize = 256;

/// Size of the hashed sparse vocabulary space.
const SPARSE_VOCABULARY: u32 = 1 << 20;

/// A sparse (keyword-style) vector: parallel index/value arrays, indices
/// strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    /// Term indices into the vocabulary space.
    pub indices: Vec<u32>,
    /// Term weights, parallel to `indices`.
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Dot product with another sparse vector (merge join over indices).
    #[must_use]
    pub fn dot(&self, other: &Self) -> f32 {
        let mut sum = 0.0;
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Scales the vector to unit L2 norm. No-op on the zero vector.
    pub fn normalize(&mut self) {
        let norm = self.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }
}

/// Produces a dense semantic vector from text.
#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    /// Dimensionality of produced vectors.
    fn dimension(&self) -> usize;

    /// Embeds one text.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Embedding`] when the generator fails.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

/// Produces a sparse keyword vector from text.
#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    /// Embeds one text.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Embedding`] when the generator fails.
    async fn embed(&self, text: &str) -> Result<SparseVector, SearchError>;
}

/// Splits text into lowercase alphanumeric tokens.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn hash_token(token: &str, salt: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    salt.hash(&mut hasher);
    token.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic dense embedder: each token hashes to a handful of signed
/// positions in the output vector; the result is L2-normalized. Texts
/// sharing vocabulary land near each other, which is all the in-memory
/// wiring needs.
#[derive(Debug, Clone)]
pub struct HashedDenseEmbedder {
    dimension: usize,
}

impl HashedDenseEmbedder {
    /// Creates an embedder with the given output dimensionality.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashedDenseEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DENSE_DIMENSION)
    }
}

#[async_trait]
impl DenseEmbedder for HashedDenseEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in tokenize(text) {
            // Three salted projections per token to spread collisions.
            for salt in 0..3_u64 {
                let h = hash_token(&token, salt);
                let position = (h % self.dimension as u64) as usize;
                let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
                vector[position] += sign;
            }
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// Deterministic sparse embedder: hashed term frequencies over a fixed
/// vocabulary space, L2-normalized so dot products behave like cosines.
#[derive(Debug, Clone, Default)]
pub struct HashedSparseEmbedder;

#[async_trait]
impl SparseEmbedder for HashedSparseEmbedder {
    async fn embed(&self, text: &str) -> Result<SparseVector, SearchError> {
        let mut counts: HashMap<u32, f32> = HashMap::new();
        for token in tokenize(text) {
            let index = (hash_token(&token, 0) % u64::from(SPARSE_VOCABULARY)) as u32;
            *counts.entry(index).or_insert(0.0) += 1.0;
        }
        let mut entries: Vec<(u32, f32)> = counts.into_iter().collect();
        entries.sort_unstable_by_key(|(index, _)| *index);
        let mut vector = SparseVector {
            indices: entries.iter().map(|(i, _)| *i).collect(),
            values: entries.iter().map(|(_, v)| *v).collect(),
        };
        vector.normalize();
        Ok(vector)
    }
}
