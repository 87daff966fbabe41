//! In-memory reference index.
//!
//! Embeds a document set once at startup and answers dense and hybrid
//! queries by brute-force cosine scoring. This is the no-dependency
//! fallback wiring: deterministic, good enough for modest knowledge
//! bases, and the reference implementation of the [`VectorIndex`] seam.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::SearchError;
use crate::search::HybridWeights;
use crate::search::embedding::{DenseEmbedder, SparseEmbedder, SparseVector};
use crate::search::index::{QueryOptions, ScoredHit, VectorIndex};

/// One source document prior to embedding.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// Stable document id; defaults to the input position when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Document text, embedded and returned in hit payloads.
    pub text: String,
    /// Opaque metadata carried through to hit payloads.
    #[serde(default)]
    pub metadata: Value,
}

impl Document {
    /// Reads documents from a JSONL file, one object per line.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::KnowledgeFile`] when the file cannot be read
    /// or a line is not a valid document object.
    pub fn load_jsonl(path: &Path) -> Result<Vec<Self>, SearchError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| SearchError::KnowledgeFile {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let mut documents = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let document: Self =
                serde_json::from_str(line).map_err(|e| SearchError::KnowledgeFile {
                    path: display.clone(),
                    message: format!("line {}: {e}", line_no + 1),
                })?;
            documents.push(document);
        }
        Ok(documents)
    }
}

#[derive(Debug)]
struct StoredDocument {
    id: String,
    dense: Vec<f32>,
    sparse: SparseVector,
    payload: Value,
}

/// Brute-force in-memory vector index.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: Vec<StoredDocument>,
}

impl MemoryIndex {
    /// Embeds the given documents and builds the index.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures.
    pub async fn build(
        documents: Vec<Document>,
        dense: &dyn DenseEmbedder,
        sparse: &dyn SparseEmbedder,
    ) -> Result<Self, SearchError> {
        let mut stored = Vec::with_capacity(documents.len());
        for (position, document) in documents.into_iter().enumerate() {
            let id = document.id.unwrap_or_else(|| format!("doc-{position}"));
            let payload = json!({
                "text": document.text,
                "metadata": document.metadata,
            });
            stored.push(StoredDocument {
                dense: dense.embed(&document.text).await?,
                sparse: sparse.embed(&document.text).await?,
                id,
                payload,
            });
        }
        info!(documents = stored.len(), "memory index built");
        Ok(Self { documents: stored })
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` when the index holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn collect_hits<F>(&self, options: QueryOptions, score_of: F) -> Vec<ScoredHit>
    where
        F: Fn(&StoredDocument) -> f32,
    {
        let mut hits: Vec<ScoredHit> = self
            .documents
            .iter()
            .map(|doc| ScoredHit {
                id: doc.id.clone(),
                score: score_of(doc),
                payload: doc.payload.clone(),
            })
            .filter(|hit| options.score_threshold.is_none_or(|t| hit.score >= t))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(options.limit);
        hits
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(
        &self,
        dense: &[f32],
        options: QueryOptions,
    ) -> Result<Vec<ScoredHit>, SearchError> {
        Ok(self.collect_hits(options, |doc| dot(&doc.dense, dense)))
    }

    async fn hybrid_search(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        weights: HybridWeights,
        options: QueryOptions,
    ) -> Result<Vec<ScoredHit>, SearchError> {
        Ok(self.collect_hits(options, |doc| {
            weights.combine(dot(&doc.dense, dense), doc.sparse.dot(sparse))
        }))
    }
}
