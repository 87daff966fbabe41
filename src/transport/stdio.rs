//! Line-oriented stdio transport.
//!
//! One JSON payload per line on stdin, one reply line on stdout. Batch
//! semantics match the HTTP JSON branch: a bare object gets a bare reply,
//! an array gets an array reply, and notification-only payloads produce no
//! output at all. Sessions do not apply; the pipe is the session.
//!
//! Logs go to stderr; stdout carries only protocol messages.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::protocol::Dispatcher;
use crate::protocol::message::{ErrorObject, Payload, Response};

/// Processes one input line and returns the reply line, if one is owed.
pub async fn handle_line(dispatcher: &Dispatcher, line: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            let envelope = Response::error(
                Value::Null,
                ErrorObject::parse_error(format!("invalid JSON: {e}")),
            );
            return serde_json::to_string(&envelope).ok();
        }
    };

    let payload = match Payload::decode(value) {
        Ok(payload) => payload,
        Err(error) => {
            let envelope = Response::error(Value::Null, error);
            return serde_json::to_string(&envelope).ok();
        }
    };

    let batched = payload.batched;
    let mut replies = Vec::new();
    for message in payload.messages {
        if let Some(response) = dispatcher.dispatch_message(message).await {
            replies.push(response);
        }
    }

    if replies.is_empty() {
        // Notification-only payloads owe nothing, not an empty array.
        return None;
    }
    if batched {
        serde_json::to_string(&replies).ok()
    } else {
        replies
            .into_iter()
            .next()
            .and_then(|single| serde_json::to_string(&single).ok())
    }
}

/// Runs the stdio loop until stdin reaches EOF.
///
/// # Errors
///
/// Returns an error when reading stdin or writing stdout fails.
pub async fn serve_stdio(dispatcher: Dispatcher) -> anyhow::Result<()> {
    info!("serving stdio transport");
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut stdout = tokio::io::stdout();
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(TransportError::Stdio)?;
        if read == 0 {
            debug!("stdin closed, stopping stdio transport");
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(reply) = handle_line(&dispatcher, trimmed).await {
            stdout
                .write_all(reply.as_bytes())
                .await
                .map_err(TransportError::Stdio)?;
            stdout.write_all(b"\n").await.map_err(TransportError::Stdio)?;
            stdout.flush().await.map_err(TransportError::Stdio)?;
        }
    }
}
