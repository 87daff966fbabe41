//! Search collaborator: embedding seams, vector index seam, and the
//! service facade the search tool calls into.
//!
//! The ranking contract lives here: a hybrid score is
//! `dense_score * dense_weight + sparse_score * sparse_weight`, with the
//! weights summing to 1 within a small tolerance. Everything network-backed
//! (model embedding services, Qdrant/Chroma-class indexes) plugs in behind
//! the [`DenseEmbedder`], [`SparseEmbedder`], and [`VectorIndex`] traits.

pub mod embedding;
pub mod index;
pub mod memory;

use std::sync::Arc;

pub use embedding::{
    DenseEmbedder, HashedDenseEmbedder, HashedSparseEmbedder, SparseEmbedder, SparseVector,
};
pub use index::{QueryOptions, ScoredHit, VectorIndex};
pub use memory::{Document, MemoryIndex};

use crate::error::SearchError;

/// Default number of hits returned when the caller does not set a limit.
pub const DEFAULT_LIMIT: usize = 10;

/// Allowed deviation of `dense + sparse` from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

/// Weights for combining dense and sparse similarity scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    /// Weight of the dense (semantic) score.
    pub dense: f32,
    /// Weight of the sparse (keyword) score.
    pub sparse: f32,
}

impl HybridWeights {
    /// Creates a weight pair without validating it; see
    /// [`is_normalized`](Self::is_normalized).
    #[must_use]
    pub const fn new(dense: f32, sparse: f32) -> Self {
        Self { dense, sparse }
    }

    /// The ranking contract: weighted sum of the two similarity scores.
    #[must_use]
    pub fn combine(self, dense_score: f32, sparse_score: f32) -> f32 {
        dense_score * self.dense + sparse_score * self.sparse
    }

    /// Returns `true` when the weights sum to 1 within
    /// [`WEIGHT_SUM_TOLERANCE`].
    #[must_use]
    pub fn is_normalized(self) -> bool {
        (self.dense + self.sparse - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }
}

impl Default for HybridWeights {
    /// Semantic-leaning default split.
    fn default() -> Self {
        Self {
            dense: 0.7,
            sparse: 0.3,
        }
    }
}

/// One search invocation, validated upstream by the tool layer.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Query text.
    pub query: String,
    /// Maximum number of hits.
    pub limit: usize,
    /// Minimum combined score; hits below are dropped.
    pub score_threshold: Option<f32>,
    /// Hybrid combination weights.
    pub weights: HybridWeights,
}

/// Facade over the embedders and the index: embeds the query both ways and
/// runs a hybrid search. Failures stay inside [`SearchError`]; the tool
/// layer folds them into `{success:false}` payloads before the dispatcher
/// sees them.
pub struct SearchService {
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEmbedder>,
    index: Arc<dyn VectorIndex>,
}

impl SearchService {
    /// Creates a service over the given collaborators.
    #[must_use]
    pub fn new(
        dense: Arc<dyn DenseEmbedder>,
        sparse: Arc<dyn SparseEmbedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            dense,
            sparse,
            index,
        }
    }

    /// Builds the default in-memory wiring over a document set.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures from index construction.
    pub async fn in_memory(documents: Vec<Document>) -> Result<Self, SearchError> {
        let dense = Arc::new(HashedDenseEmbedder::default());
        let sparse = Arc::new(HashedSparseEmbedder);
        let index = MemoryIndex::build(documents, dense.as_ref(), sparse.as_ref()).await?;
        Ok(Self::new(dense, sparse, Arc::new(index)))
    }

    /// Runs one hybrid search.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] on embedding or index failure.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredHit>, SearchError> {
        let dense = self.dense.embed(&request.query).await?;
        let sparse = self.sparse.embed(&request.query).await?;
        self.index
            .hybrid_search(
                &dense,
                &sparse,
                request.weights,
                QueryOptions {
                    limit: request.limit,
                    score_threshold: request.score_threshold,
                },
            )
            .await
    }
}
