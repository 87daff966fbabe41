//! Error types for dkr-rs.
//!
//! Each subsystem has its own `thiserror` enum; the top-level [`Error`]
//! aggregates them so callers can use the crate-wide [`Result`] alias.
//! Protocol-level failures (malformed envelopes, unknown methods) are not
//! errors in this sense; they travel back to clients as JSON-RPC error
//! envelopes and never unwind through these types.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type aggregating all subsystem errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Search collaborator error.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// CLI command error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while validating or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Endpoint paths must be absolute.
    #[error("invalid endpoint path {0:?}: must start with '/'")]
    InvalidEndpoint(String),

    /// A zero session timeout would expire every session immediately.
    #[error("session timeout must be greater than zero")]
    ZeroSessionTimeout,

    /// TLS needs both halves of the key material.
    #[error("TLS requires both a certificate and a private key")]
    PartialTls,

    /// Allowed-origin entries must be non-empty.
    #[error("invalid allowed origin: empty entry")]
    EmptyOrigin,
}

/// Errors raised by the stdio and HTTP transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listening socket could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TLS material could not be loaded. Fatal at startup.
    #[error("failed to load TLS material from {cert:?}/{key:?}: {source}")]
    Tls {
        /// Certificate path.
        cert: PathBuf,
        /// Private key path.
        key: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The accept/serve loop failed.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// Reading or writing a stdio line failed.
    #[error("stdio I/O error: {0}")]
    Stdio(#[source] std::io::Error),

    /// An outbound message could not be serialized.
    #[error("message serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised by the search collaborator.
///
/// These never cross the tool boundary as errors; the search tool folds
/// them into `{success:false, error}` payloads before the dispatcher sees
/// them.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Dense or sparse embedding failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector index rejected the query.
    #[error("vector index error: {0}")]
    Index(String),

    /// A knowledge file could not be read or parsed.
    #[error("knowledge file {path}: {message}")]
    KnowledgeFile {
        /// Path to the offending file.
        path: String,
        /// What went wrong.
        message: String,
    },
}

/// Errors raised while executing CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Output could not be formatted.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}
