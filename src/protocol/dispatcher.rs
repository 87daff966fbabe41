//! Request dispatch: method table and response construction.
//!
//! The dispatcher is session-agnostic; minting sessions and choosing the
//! delivery channel (JSON body versus SSE event) belong to the transports.
//! Given a classified [`Message`] it produces at most one [`Response`]:
//! requests always get one, notifications and inbound responses never do,
//! and malformed envelopes get an InvalidRequest reply that does not abort
//! their batch siblings.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::protocol::message::{ErrorObject, Message, Request, Response};
use crate::tools::ToolCatalog;

/// Protocol revision advertised by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Maps inbound requests to handlers and wraps tool outcomes.
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<ToolCatalog>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given tool catalog.
    #[must_use]
    pub fn new(catalog: Arc<ToolCatalog>) -> Self {
        Self { catalog }
    }

    /// Returns the tool catalog backing this dispatcher.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    /// Handles one classified envelope.
    ///
    /// Returns `Some` exactly when a reply is owed: for requests and for
    /// malformed envelopes. Notifications are acknowledged silently;
    /// inbound responses (a client answering a server-initiated message)
    /// are logged and dropped.
    pub async fn dispatch_message(&self, message: Message) -> Option<Response> {
        match message {
            Message::Request(request) => Some(self.dispatch(request).await),
            Message::Notification(notification) => {
                debug!(method = %notification.method, "notification received");
                None
            }
            Message::Response(response) => {
                debug!(id = %response.id, "client response received");
                None
            }
            Message::Malformed(value) => {
                warn!(%value, "malformed envelope");
                Some(Response::error(
                    Value::Null,
                    ErrorObject::invalid_request("envelope is not a request, notification, or response"),
                ))
            }
        }
    }

    /// Handles one true request and produces its response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request { id, method, params } = request;
        debug!(%method, %id, "dispatching request");
        match method.as_str() {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, params).await,
            "ping" => Response::success(id, json!({})),
            other => Response::error(
                id,
                ErrorObject::method_not_found(format!("method not found: {other}")),
            ),
        }
    }

    /// Builds the `initialize` result: server identity plus a capability
    /// descriptor echoing the tool catalog, so `tools/list` issued
    /// afterwards returns exactly what was advertised here.
    fn handle_initialize(&self, id: Value) -> Response {
        Response::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "tools": self.catalog.descriptors(),
            }),
        )
    }

    fn handle_list_tools(&self, id: Value) -> Response {
        Response::success(id, json!({ "tools": self.catalog.descriptors() }))
    }

    /// Invokes a named tool and wraps its outcome as a single text content
    /// block containing the JSON-encoded tool result. Argument-validation
    /// failures and search failures arrive already folded into
    /// `{success:false, error}` outcomes, so they are successful JSON-RPC
    /// responses; only an unknown tool name is a protocol error.
    async fn handle_call_tool(&self, id: Value, params: Option<Value>) -> Response {
        let Some(params) = params else {
            return Response::error(id, ErrorObject::invalid_params("missing params"));
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return Response::error(id, ErrorObject::invalid_params("missing tool name"));
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let Some(outcome) = self.catalog.invoke(name, arguments).await else {
            return Response::error(
                id,
                ErrorObject::method_not_found(format!("unknown tool: {name}")),
            );
        };

        match serde_json::to_string(&outcome) {
            Ok(text) => Response::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": text }]
                }),
            ),
            Err(e) => Response::error(
                id,
                ErrorObject::internal_error(format!("failed to encode tool result: {e}")),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutcome;
    use crate::tools::testing::catalog_with_echo_tool;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(catalog_with_echo_tool()))
    }

    #[tokio::test]
    async fn test_initialize_echoes_tool_descriptors() {
        let d = dispatcher();
        let init = d
            .dispatch(Request {
                id: json!(1),
                method: "initialize".to_string(),
                params: Some(json!({"clientInfo": {"name": "t"}})),
            })
            .await;
        let init_result = init.result.unwrap_or_default();
        assert_eq!(init_result["protocolVersion"], PROTOCOL_VERSION);
        assert!(init_result["serverInfo"]["name"].is_string());

        let list = d
            .dispatch(Request {
                id: json!(2),
                method: "tools/list".to_string(),
                params: None,
            })
            .await;
        let list_result = list.result.unwrap_or_default();
        // Round-trip: tools/list matches what initialize advertised.
        assert_eq!(init_result["tools"], list_result["tools"]);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = dispatcher()
            .dispatch(Request {
                id: json!(1),
                method: "no/such".to_string(),
                params: None,
            })
            .await;
        let error = response.error.unwrap_or_else(|| unreachable!());
        assert_eq!(error.code, crate::protocol::message::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_call_tool_wraps_outcome_in_text_content() {
        let response = dispatcher()
            .dispatch(Request {
                id: json!(3),
                method: "tools/call".to_string(),
                params: Some(json!({"name": "echo", "arguments": {"value": "hi"}})),
            })
            .await;
        let result = response.result.unwrap_or_default();
        assert_eq!(result["content"][0]["type"], "text");
        let text = result["content"][0]["text"].as_str().unwrap_or_default();
        let outcome: ToolOutcome = serde_json::from_str(text).unwrap_or_else(|_| unreachable!());
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_call_tool_unknown_name() {
        let response = dispatcher()
            .dispatch(Request {
                id: json!(4),
                method: "tools/call".to_string(),
                params: Some(json!({"name": "missing", "arguments": {}})),
            })
            .await;
        let error = response.error.unwrap_or_else(|| unreachable!());
        assert_eq!(error.code, crate::protocol::message::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notification_and_response_produce_no_reply() {
        let d = dispatcher();
        let reply = d
            .dispatch_message(Message::classify(json!({"method": "notifications/initialized"})))
            .await;
        assert!(reply.is_none());

        let reply = d
            .dispatch_message(Message::classify(json!({"id": 9, "result": {}})))
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_malformed_yields_invalid_request_with_null_id() {
        let reply = dispatcher()
            .dispatch_message(Message::classify(json!({"bogus": 1})))
            .await
            .unwrap_or_else(|| unreachable!());
        assert_eq!(reply.id, Value::Null);
        let error = reply.error.unwrap_or_else(|| unreachable!());
        assert_eq!(error.code, crate::protocol::message::INVALID_REQUEST);
    }
}
