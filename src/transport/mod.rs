//! Transport layer: the streamable HTTP/SSE transport and the
//! line-oriented stdio transport.
//!
//! Both feed decoded payloads through the same [`Dispatcher`]; only the
//! HTTP transport carries sessions, since over stdio the pipe itself is
//! the session.
//!
//! [`Dispatcher`]: crate::protocol::Dispatcher

pub mod http;
pub mod stdio;

pub use http::{AppState, SESSION_HEADER, router, serve_http};
pub use stdio::serve_stdio;
