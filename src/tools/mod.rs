//! Tool catalog: named, schema-described operations the dispatcher can
//! invoke on behalf of clients.
//!
//! Handlers never error across this boundary: every failure, including
//! argument validation, is folded into a [`ToolOutcome`] with
//! `success:false` so clients always receive a well-formed tool result
//! envelope.

pub mod params;
pub mod search;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use params::SearchParams;
pub use search::SearchTool;

/// Describes one invocable tool for `tools/list` and the `initialize`
/// capability echo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within the catalog.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema of the tool's arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The uniform tool result shape: `{success:true, results:[...]}` or
/// `{success:false, error}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Result objects, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Value>>,
    /// Failure message, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    /// Builds a success outcome.
    #[must_use]
    pub const fn ok(results: Vec<Value>) -> Self {
        Self {
            success: true,
            results: Some(results),
            error: None,
        }
    }

    /// Builds a failure outcome.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            error: Some(message.into()),
        }
    }
}

/// One invocable tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Returns the tool's descriptor.
    fn descriptor(&self) -> ToolDescriptor;

    /// Invokes the tool. Infallible across the boundary: failures are
    /// folded into the outcome.
    async fn invoke(&self, arguments: Value) -> ToolOutcome;
}

/// Registry of tools, preserving registration order.
#[derive(Default)]
pub struct ToolCatalog {
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl ToolCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, returning the catalog for chaining.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn ToolHandler>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Returns descriptors for every registered tool, in registration
    /// order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    /// Invokes a tool by name. Returns `None` for unknown names, the only
    /// tool failure that surfaces as a protocol error rather than a
    /// `success:false` outcome.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Option<ToolOutcome> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.descriptor().name == name)?;
        Some(tool.invoke(arguments).await)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::catalog_with_echo_tool;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_serialization_shapes() {
        let ok = ToolOutcome::ok(vec![json!({"id": "a"})]);
        let text = serde_json::to_string(&ok).unwrap_or_default();
        assert!(text.contains("\"success\":true"));
        assert!(!text.contains("\"error\""));

        let failed = ToolOutcome::failure("bad limit");
        let text = serde_json::to_string(&failed).unwrap_or_default();
        assert!(text.contains("\"success\":false"));
        assert!(text.contains("bad limit"));
        assert!(!text.contains("\"results\""));
    }

    #[tokio::test]
    async fn test_catalog_invoke_known_and_unknown() {
        let catalog = catalog_with_echo_tool();
        assert_eq!(catalog.len(), 1);

        let outcome = catalog
            .invoke("echo", json!({"x": 1}))
            .await
            .unwrap_or_else(|| unreachable!());
        assert!(outcome.success);

        assert!(catalog.invoke("missing", json!({})).await.is_none());
    }

    #[test]
    fn test_descriptors_preserve_registration_order() {
        let catalog = catalog_with_echo_tool();
        let names: Vec<String> = catalog.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["echo".to_string()]);
    }
}
