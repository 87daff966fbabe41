//! JSON-RPC protocol layer: envelope classification and request dispatch.
//!
//! The transports own framing and session lifecycle; this module owns the
//! meaning of the bytes in between. [`message`] turns decoded JSON into a
//! tagged envelope union and normalizes bare-object versus batch payloads;
//! [`dispatcher`] maps requests onto the built-in method table and the tool
//! catalog.

pub mod dispatcher;
pub mod message;

pub use dispatcher::{Dispatcher, PROTOCOL_VERSION};
pub use message::{ErrorObject, Message, Notification, Payload, Request, Response};
