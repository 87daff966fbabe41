//! Tool parameter types.
//!
//! Defines the input schemas for catalog tools using `schemars` for
//! automatic JSON Schema generation required by the protocol.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `query_domain_knowledge` tool.
///
/// Only `query` is required; everything else falls back to server defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchParams {
    /// The search query text.
    pub query: String,

    /// Maximum number of results (1 to the server's configured cap).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Minimum combined similarity score (0.0–1.0); results below are
    /// dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,

    /// Weight of the dense (semantic) score. Must be supplied together
    /// with `sparseWeight`; the two must sum to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense_weight: Option<f32>,

    /// Weight of the sparse (keyword) score. Must be supplied together
    /// with `denseWeight`; the two must sum to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_weight: Option<f32>,
}
