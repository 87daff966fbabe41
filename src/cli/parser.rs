//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DKR-RS: domain knowledge retrieval server.
///
/// Serves a hybrid-search knowledge tool over a JSON-RPC protocol, either
/// on stdio or over streamable HTTP with SSE.
#[derive(Parser, Debug)]
#[command(name = "dkr-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Knowledge base file (JSONL, one document object per line).
    ///
    /// Omitting it starts the server with an empty index.
    #[arg(short, long, env = "DKR_KNOWLEDGE", global = true)]
    pub knowledge: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the retrieval server.
    #[command(subcommand)]
    Serve(ServeCommands),

    /// Print the tool catalog (names, descriptions, input schemas).
    #[command(after_help = r#"Examples:
  dkr-rs tools                         # Human-readable catalog
  dkr-rs tools --format json           # JSON for programmatic use
"#)]
    Tools {
        /// Output format (text, json).
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Server transport subcommands.
#[derive(Subcommand, Debug)]
pub enum ServeCommands {
    /// Serve over stdio (line-oriented JSON-RPC).
    ///
    /// Reads one JSON payload per line from stdin and writes reply lines
    /// to stdout. This is the standard transport for local agent
    /// integration.
    #[command(after_help = r#"Examples:
  dkr-rs serve stdio                              # Empty index
  dkr-rs --knowledge docs.jsonl serve stdio       # Indexed knowledge base
"#)]
    Stdio,

    /// Serve over streamable HTTP with SSE.
    ///
    /// Exposes a single endpoint handling POST (requests), GET (server
    /// push channel), DELETE (session teardown), and OPTIONS (CORS
    /// preflight).
    #[command(after_help = r#"Examples:
  dkr-rs serve http                               # 127.0.0.1:3000/mcp
  dkr-rs serve http --host 0.0.0.0 --port 8080
  dkr-rs serve http --allowed-origin https://app.example.com
  dkr-rs serve http --session-timeout 600
  dkr-rs serve http --tls-cert cert.pem --tls-key key.pem
"#)]
    Http {
        /// Host to bind to.
        #[arg(long, env = "DKR_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, env = "DKR_PORT", default_value = "3000")]
        port: u16,

        /// Endpoint path serving the protocol.
        #[arg(long, env = "DKR_ENDPOINT", default_value = "/mcp")]
        endpoint: String,

        /// Origin allow-list entry; repeat for multiple origins. An empty
        /// list allows any origin (development mode).
        #[arg(long = "allowed-origin")]
        allowed_origins: Vec<String>,

        /// Session idle timeout in seconds.
        #[arg(long, env = "DKR_SESSION_TIMEOUT", default_value = "1800")]
        session_timeout: u64,

        /// Maximum results the search tool may return per call.
        #[arg(long, env = "DKR_MAX_RESULTS", default_value = "50")]
        max_results: usize,

        /// TLS certificate chain (PEM). Requires --tls-key.
        #[arg(long, requires = "tls_key")]
        tls_cert: Option<PathBuf>,

        /// TLS private key (PEM). Requires --tls-cert.
        #[arg(long, requires = "tls_cert")]
        tls_key: Option<PathBuf>,
    },
}
