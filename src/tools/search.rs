//! The `query_domain_knowledge` tool.
//!
//! Validates arguments against the server's limits and runs a hybrid
//! search through the [`SearchService`]. Validation violations are
//! InvalidParams-class failures and search errors are collaborator
//! failures; both are folded into `{success:false, error}` outcomes so the
//! transport never sees them as errors.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::search::{DEFAULT_LIMIT, HybridWeights, SearchRequest, SearchService};
use crate::tools::params::SearchParams;
use crate::tools::{ToolDescriptor, ToolHandler, ToolOutcome};

/// Wire name of the tool.
pub const SEARCH_TOOL_NAME: &str = "query_domain_knowledge";

/// Hybrid search over the indexed domain knowledge base.
pub struct SearchTool {
    service: Arc<SearchService>,
    max_results: usize,
}

impl SearchTool {
    /// Creates the tool over a search service with the given result cap.
    #[must_use]
    pub fn new(service: Arc<SearchService>, max_results: usize) -> Self {
        Self {
            service,
            max_results,
        }
    }

    /// Checks every argument bound. Messages are phrased for clients and
    /// become the `error` field of a failed outcome.
    fn validate(&self, params: &SearchParams) -> Result<(), String> {
        if let Some(limit) = params.limit {
            if limit < 1 || limit > self.max_results {
                return Err(format!(
                    "limit must be between 1 and {}, got {limit}",
                    self.max_results
                ));
            }
        }
        if let Some(threshold) = params.score_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(format!(
                    "scoreThreshold must be between 0.0 and 1.0, got {threshold}"
                ));
            }
        }
        match (params.dense_weight, params.sparse_weight) {
            (None, None) => {}
            (Some(dense), Some(sparse)) => {
                if !(0.0..=1.0).contains(&dense) || !(0.0..=1.0).contains(&sparse) {
                    return Err(format!(
                        "hybrid weights must each be between 0.0 and 1.0, got {dense} and {sparse}"
                    ));
                }
                if !HybridWeights::new(dense, sparse).is_normalized() {
                    return Err(format!(
                        "hybrid weights must sum to 1.0, got {}",
                        dense + sparse
                    ));
                }
            }
            _ => {
                return Err(
                    "denseWeight and sparseWeight must be supplied together".to_string(),
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ToolHandler for SearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search the indexed domain knowledge base. Combines semantic \
                          (dense vector) and keyword (sparse vector) similarity into a \
                          weighted hybrid ranking and returns the top matching documents \
                          with scores."
                .to_string(),
            input_schema: serde_json::to_value(schemars::schema_for!(SearchParams))
                .unwrap_or_else(|_| serde_json::json!({ "type": "object" })),
        }
    }

    async fn invoke(&self, arguments: Value) -> ToolOutcome {
        let params: SearchParams = match serde_json::from_value(arguments) {
            Ok(params) => params,
            Err(e) => return ToolOutcome::failure(format!("invalid params: {e}")),
        };
        if let Err(message) = self.validate(&params) {
            return ToolOutcome::failure(format!("invalid params: {message}"));
        }

        let request = SearchRequest {
            query: params.query,
            limit: params.limit.unwrap_or(DEFAULT_LIMIT),
            score_threshold: params.score_threshold,
            weights: match (params.dense_weight, params.sparse_weight) {
                (Some(dense), Some(sparse)) => HybridWeights::new(dense, sparse),
                _ => HybridWeights::default(),
            },
        };

        match self.service.search(&request).await {
            Ok(hits) => {
                debug!(query = %request.query, hits = hits.len(), "search completed");
                let results = hits
                    .into_iter()
                    .map(|hit| serde_json::to_value(hit).unwrap_or(Value::Null))
                    .collect();
                ToolOutcome::ok(results)
            }
            Err(e) => ToolOutcome::failure(e.to_string()),
        }
    }
}
