//! Vector index seam.
//!
//! Network-backed adapters (Qdrant/Chroma-class services) implement
//! [`VectorIndex`] out of tree; the crate ships the in-memory
//! [`MemoryIndex`](crate::search::memory::MemoryIndex) behind the same
//! trait for the default wiring and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SearchError;
use crate::search::HybridWeights;
use crate::search::embedding::SparseVector;

/// One search hit: document id, combined score, stored payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredHit {
    /// Document id.
    pub id: String,
    /// Similarity score, higher is better.
    pub score: f32,
    /// Stored document payload (text plus metadata).
    pub payload: Value,
}

/// Query parameters shared by both search modes.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Maximum number of hits to return.
    pub limit: usize,
    /// Hits scoring below this are dropped. `None` keeps everything.
    pub score_threshold: Option<f32>,
}

/// A searchable vector index over embedded documents.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dense-only similarity search, sorted by descending score.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Index`] when the index rejects the query.
    async fn search(
        &self,
        dense: &[f32],
        options: QueryOptions,
    ) -> Result<Vec<ScoredHit>, SearchError>;

    /// Hybrid search combining dense and sparse similarity with the given
    /// weights, sorted by descending combined score.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Index`] when the index rejects the query.
    async fn hybrid_search(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        weights: HybridWeights,
        options: QueryOptions,
    ) -> Result<Vec<ScoredHit>, SearchError>;
}
