//! DKR-RS: domain knowledge retrieval server.
//!
//! Exposes a `query_domain_knowledge` hybrid-search tool over a
//! JSON-RPC-based protocol, transported either on stdio (one payload per
//! line) or over streamable HTTP with SSE push channels and
//! server-assigned sessions.
//!
//! # Architecture
//!
//! ```text
//! Client
//!   ↓ HTTP POST/GET/DELETE            ↓ stdin line
//! transport::http                   transport::stdio
//!   ├── origin validation             │
//!   ├── session resolution            │
//!   ↓                                 ↓
//! protocol::Payload::decode  (classify envelopes)
//!   ↓
//! protocol::Dispatcher  (initialize, tools/list, tools/call, ping)
//!   ↓
//! tools::ToolCatalog → tools::SearchTool
//!   ↓
//! search::SearchService  (dense + sparse embedding, hybrid ranking)
//!   ↓
//! Response → JSON body | SSE event | stdout line
//! ```
//!
//! The session store ([`session::SessionStore`]) is the only shared
//! mutable state: the HTTP transport mints a session on `initialize`,
//! surfaces its id via the `X-Session-Id` header, and every SSE sink is
//! owned by its session so teardown closes them all.

pub mod cli;
pub mod config;
pub mod error;
pub mod protocol;
pub mod search;
pub mod session;
pub mod tools;
pub mod transport;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{Error, Result};
pub use protocol::Dispatcher;
pub use session::SessionStore;
pub use tools::ToolCatalog;
