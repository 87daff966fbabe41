//! CLI command implementations.
//!
//! Contains the business logic for each CLI command: wiring the knowledge
//! base into a tool catalog, constructing the async runtime, and handing
//! control to the selected transport.

use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::parser::{Cli, Commands, ServeCommands};
use crate::config::ServerConfig;
use crate::error::{CommandError, Error, Result};
use crate::protocol::Dispatcher;
use crate::search::{Document, SearchService};
use crate::tools::{SearchTool, ToolCatalog};
use crate::transport::{serve_http, serve_stdio};

/// Executes the parsed CLI command and returns its printable output.
///
/// # Errors
///
/// Returns [`Error`] when the knowledge base cannot be loaded, the runtime
/// cannot be constructed, or the selected transport fails.
pub fn execute(cli: &Cli) -> Result<String> {
    match &cli.command {
        Commands::Serve(serve) => cmd_serve(serve, cli.knowledge.as_deref()),
        Commands::Tools { format } => cmd_tools(format, cli.knowledge.as_deref()),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("failed to create async runtime: {e}")).into()
    })
}

/// Loads the knowledge base (empty when no file is given), wires the
/// in-memory search service, and builds the dispatcher over the catalog.
async fn build_dispatcher(knowledge: Option<&Path>, max_results: usize) -> Result<Dispatcher> {
    let documents = match knowledge {
        Some(path) => Document::load_jsonl(path)?,
        None => Vec::new(),
    };
    let service = SearchService::in_memory(documents).await?;
    let catalog =
        ToolCatalog::new().with_tool(Arc::new(SearchTool::new(Arc::new(service), max_results)));
    Ok(Dispatcher::new(Arc::new(catalog)))
}

/// Starts the server with the selected transport and runs it until the
/// client disconnects (stdio) or the process is interrupted (HTTP).
fn cmd_serve(cmd: &ServeCommands, knowledge: Option<&Path>) -> Result<String> {
    let rt = build_runtime()?;
    rt.block_on(async {
        match cmd {
            ServeCommands::Stdio => {
                let max_results = ServerConfig::default().max_results;
                let dispatcher = build_dispatcher(knowledge, max_results).await?;
                serve_stdio(dispatcher).await.map_err(|e| {
                    Error::from(CommandError::ExecutionFailed(format!("server error: {e}")))
                })
            }
            ServeCommands::Http {
                host,
                port,
                endpoint,
                allowed_origins,
                session_timeout,
                max_results,
                tls_cert,
                tls_key,
            } => {
                let mut builder = ServerConfig::builder()
                    .host(host)
                    .port(*port)
                    .endpoint(endpoint)
                    .session_timeout(Duration::from_secs(*session_timeout))
                    .allowed_origins(allowed_origins.clone())
                    .max_results(*max_results);
                if let (Some(cert), Some(key)) = (tls_cert, tls_key) {
                    builder = builder.tls_cert(cert).tls_key(key);
                }
                let config = builder.build()?;

                let dispatcher = build_dispatcher(knowledge, config.max_results).await?;
                serve_http(dispatcher, config).await.map_err(|e| {
                    Error::from(CommandError::ExecutionFailed(format!("server error: {e}")))
                })
            }
        }
    })?;
    Ok(String::new())
}

/// Prints the tool catalog.
fn cmd_tools(format: &str, knowledge: Option<&Path>) -> Result<String> {
    let rt = build_runtime()?;
    let max_results = ServerConfig::default().max_results;
    let descriptors = rt.block_on(async {
        build_dispatcher(knowledge, max_results)
            .await
            .map(|d| d.catalog().descriptors())
    })?;

    match format {
        "json" => serde_json::to_string_pretty(&descriptors)
            .map_err(|e| CommandError::OutputFormat(e.to_string()).into()),
        _ => {
            let mut output = String::new();
            for descriptor in &descriptors {
                let _ = writeln!(output, "{}", descriptor.name);
                let _ = writeln!(output, "  {}", descriptor.description);
            }
            Ok(output)
        }
    }
}
