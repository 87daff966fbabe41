//! JSON-RPC 2.0 envelope types and message classification.
//!
//! Inbound payloads are decoded once into a tagged [`Message`] union instead
//! of probing fields at every call site. The three well-formed variants are
//! mutually exclusive and exhaustive; anything else is [`Message::Malformed`]
//! and yields an InvalidRequest envelope without aborting batch siblings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON-RPC protocol version string carried on every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC reserved error code: invalid JSON was received.
pub const PARSE_ERROR: i32 = -32700;
/// JSON-RPC reserved error code: the payload is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;
/// JSON-RPC reserved error code: the method does not exist.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC reserved error code: invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// JSON-RPC reserved error code: internal server error.
pub const INTERNAL_ERROR: i32 = -32603;

/// A request envelope: carries an id and expects exactly one response.
///
/// By construction the id is a JSON string or number, never null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request id, echoed verbatim on the response.
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A notification envelope: a method call that never produces a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A response envelope: exactly one of `result` or `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version marker.
    pub jsonrpc: String,
    /// Id of the request being answered (null when it was unknowable).
    pub id: Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(id: Value, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Reserved or server-defined error code.
    pub code: i32,
    /// Short human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Invalid JSON was received (-32700).
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: PARSE_ERROR,
            message: message.into(),
            data: None,
        }
    }

    /// The payload is not a valid request object (-32600).
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_REQUEST,
            message: message.into(),
            data: None,
        }
    }

    /// The method does not exist (-32601).
    #[must_use]
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: message.into(),
            data: None,
        }
    }

    /// Invalid method parameters (-32602).
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
            data: None,
        }
    }

    /// Internal server error (-32603).
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }
}

/// A classified inbound envelope.
#[derive(Debug, Clone)]
pub enum Message {
    /// A true request: has `method` and a string or number `id`.
    Request(Request),
    /// A notification: has `method`, id absent or null.
    Notification(Notification),
    /// A response to a server-initiated message: `result`/`error`, no
    /// `method`.
    Response(Response),
    /// Anything else; carries the original value for logging.
    Malformed(Value),
}

impl Message {
    /// Classifies one decoded JSON value as an envelope.
    ///
    /// The rules are those of JSON-RPC 2.0: a `method` member makes the
    /// value a call, and the presence of a non-null string-or-number `id`
    /// decides request versus notification. Values without `method` but
    /// with `result` or `error` are responses. Everything else (scalars,
    /// arrays, objects with a non-string `method` or an id of a forbidden
    /// type) is malformed.
    #[must_use]
    pub fn classify(value: Value) -> Self {
        if !value.is_object() {
            return Self::Malformed(value);
        }
        let id = value.get("id").cloned();
        let params = value.get("params").cloned();

        if let Some(method) = value.get("method") {
            let Some(method) = method.as_str().map(str::to_owned) else {
                return Self::Malformed(value);
            };
            return match id {
                None | Some(Value::Null) => {
                    Self::Notification(Notification { method, params })
                }
                Some(id @ (Value::String(_) | Value::Number(_))) => {
                    Self::Request(Request { id, method, params })
                }
                Some(_) => Self::Malformed(value),
            };
        }

        let result = value.get("result").cloned();
        let error = value
            .get("error")
            .cloned()
            .and_then(|e| serde_json::from_value::<ErrorObject>(e).ok());
        if result.is_some() || error.is_some() {
            return Self::Response(Response {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: id.unwrap_or(Value::Null),
                result,
                error,
            });
        }

        Self::Malformed(value)
    }

    /// Returns `true` for [`Message::Request`].
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Returns `true` for [`Message::Notification`].
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        matches!(self, Self::Notification(_))
    }

    /// Returns `true` for [`Message::Response`].
    #[must_use]
    pub const fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }
}

/// A normalized inbound payload: the envelope list plus the shape it
/// arrived in, which decides the reply shape (bare object in, bare object
/// out; array in, array out, even for a single element).
#[derive(Debug, Clone)]
pub struct Payload {
    /// Classified envelopes in arrival order.
    pub messages: Vec<Message>,
    /// Whether the payload arrived wrapped in an array.
    pub batched: bool,
}

impl Payload {
    /// Normalizes a decoded JSON value into an envelope list.
    ///
    /// # Errors
    ///
    /// Returns an InvalidRequest [`ErrorObject`] when the value is neither
    /// an object nor an array, or is an empty array.
    pub fn decode(value: Value) -> Result<Self, ErrorObject> {
        match value {
            Value::Object(_) => Ok(Self {
                messages: vec![Message::classify(value)],
                batched: false,
            }),
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(ErrorObject::invalid_request("empty batch"));
                }
                Ok(Self {
                    messages: items.into_iter().map(Message::classify).collect(),
                    batched: true,
                })
            }
            _ => Err(ErrorObject::invalid_request(
                "payload must be an object or an array of objects",
            )),
        }
    }

    /// Returns `true` if at least one envelope is a true request.
    #[must_use]
    pub fn has_requests(&self) -> bool {
        self.messages.iter().any(Message::is_request)
    }

    /// Returns the ids of all true requests, in arrival order.
    #[must_use]
    pub fn request_ids(&self) -> Vec<Value> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Request(r) => Some(r.id.clone()),
                _ => None,
            })
            .collect()
    }
}
