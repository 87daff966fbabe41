//! Streamable HTTP transport.
//!
//! One configurable endpoint multiplexes the whole protocol:
//!
//! - `POST` carries client→server envelopes and replies with a JSON body,
//!   a call-scoped SSE stream, or `202 Accepted`;
//! - `GET` opens the standing server→client SSE push channel;
//! - `DELETE` ends the session;
//! - `OPTIONS` answers CORS preflight.
//!
//! Every exchange walks the same state machine:
//! route → validate origin → resolve session → method dispatch. Transport
//! failures surface as plain HTTP statuses (they happen before any envelope
//! exists); protocol failures travel as JSON-RPC error envelopes.

use std::collections::HashSet;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::any;
use axum::Router;
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::Value;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::TransportError;
use crate::protocol::message::{ErrorObject, Message, Payload, Response};
use crate::protocol::Dispatcher;
use crate::session::{Session, SessionStore, StreamId};

/// Header carrying the session id on requests and responses.
pub const SESSION_HEADER: &str = "x-session-id";

/// Methods served by the endpoint, for `Allow` and preflight headers.
const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";

/// Headers a browser client may send cross-origin.
const ALLOWED_HEADERS: &str = "Content-Type, Accept, X-Session-Id, Last-Event-ID";

/// Shared state behind the router.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Dispatcher,
    sessions: Arc<SessionStore>,
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Creates the shared transport state.
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        sessions: Arc<SessionStore>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            config,
        }
    }

    /// Returns the session store (exposed for push-channel callers).
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }
}

/// Builds the axum router serving the configured endpoint; every other
/// path is 404.
#[must_use]
pub fn router(state: AppState) -> Router {
    let endpoint = state.config.endpoint.clone();
    Router::new()
        .route(&endpoint, any(handle_endpoint))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
        .with_state(state)
}

/// Binds and serves the transport until ctrl-c (plain HTTP) or a fatal
/// error. TLS material in the configuration switches the listener to
/// HTTPS.
///
/// # Errors
///
/// Returns an error when the socket cannot be bound, the TLS material
/// cannot be loaded, or the accept loop fails.
pub async fn serve_http(dispatcher: Dispatcher, config: ServerConfig) -> anyhow::Result<()> {
    let sessions = Arc::new(SessionStore::new(config.session_timeout));
    let shutdown = CancellationToken::new();
    let sweeper = sessions.spawn_sweeper(config.sweep_interval, shutdown.child_token());

    let config = Arc::new(config);
    let state = AppState::new(dispatcher, sessions, Arc::clone(&config));
    let app = router(state);
    let addr = config.bind_addr();

    let result = match &config.tls {
        Some(tls) => {
            let socket_addr: SocketAddr = addr.parse().map_err(|e| TransportError::Bind {
                addr: addr.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            })?;
            let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                &tls.cert, &tls.key,
            )
            .await
            .map_err(|e| TransportError::Tls {
                cert: tls.cert.clone(),
                key: tls.key.clone(),
                source: e,
            })?;
            info!(%addr, endpoint = %config.endpoint, "serving HTTPS transport");
            axum_server::bind_rustls(socket_addr, rustls)
                .serve(app.into_make_service())
                .await
                .map_err(TransportError::Serve)
        }
        None => {
            let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
                TransportError::Bind {
                    addr: addr.clone(),
                    source: e,
                }
            })?;
            info!(%addr, endpoint = %config.endpoint, "serving HTTP transport");
            let ctrl_c_shutdown = shutdown.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    ctrl_c_shutdown.cancel();
                })
                .await
                .map_err(TransportError::Serve)
        }
    };

    shutdown.cancel();
    let _ = sweeper.await;
    Ok(result?)
}

/// Single entry point for the endpoint: walks the state machine and hands
/// off to the per-method handlers.
async fn handle_endpoint(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    if !origin_allowed(&state.config, &headers) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    if method == Method::OPTIONS {
        preflight(&headers)
    } else if method == Method::POST {
        handle_post(state, headers, body).await
    } else if method == Method::GET {
        handle_get(state, headers).await
    } else if method == Method::DELETE {
        handle_delete(state, headers).await
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, ALLOWED_METHODS)],
            "method not allowed",
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Origin validation and CORS
// ---------------------------------------------------------------------------

/// DNS-rebinding defence. Requests without an `Origin` header (non-browser
/// clients) always pass; an empty allow-list admits any origin
/// (development mode). Entries match case-sensitively, `*` matches
/// everything, and a trailing `*` matches by prefix.
fn origin_allowed(config: &ServerConfig, headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    if config.allowed_origins.is_empty() {
        return true;
    }
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    config.allowed_origins.iter().any(|entry| {
        entry == "*"
            || entry == origin
            || entry
                .strip_suffix('*')
                .is_some_and(|prefix| origin.starts_with(prefix))
    })
}

/// Answers CORS preflight with 204, short-circuiting the state machine.
fn preflight(headers: &HeaderMap) -> HttpResponse {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let response_headers = response.headers_mut();
    if let Some(origin) = headers.get(header::ORIGIN) {
        response_headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    } else {
        response_headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
    }
    response_headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    response_headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response_headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("3600"),
    );
    response
}

/// Stamps the bound session id and CORS headers onto an outgoing response.
fn finalize(
    mut response: HttpResponse,
    session: Option<&Arc<Session>>,
    headers: &HeaderMap,
) -> HttpResponse {
    if let Some(session) = session
        && let Ok(value) = HeaderValue::from_str(session.id())
    {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    if let Some(origin) = headers.get(header::ORIGIN) {
        let response_headers = response.headers_mut();
        response_headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        response_headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("X-Session-Id"),
        );
    }
    response
}

// ---------------------------------------------------------------------------
// POST: client → server envelopes
// ---------------------------------------------------------------------------

fn content_type_is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

fn accept_header(headers: &HeaderMap) -> &str {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("*/*")
}

fn session_id_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

/// Finds the first `initialize` request in the batch and returns its
/// `clientInfo`, if any envelope is an initialize at all.
fn initialize_client_info(messages: &[Message]) -> Option<Option<Value>> {
    messages.iter().find_map(|m| match m {
        Message::Request(r) if r.method == "initialize" => Some(
            r.params
                .as_ref()
                .and_then(|p| p.get("clientInfo"))
                .cloned(),
        ),
        _ => None,
    })
}

async fn handle_post(state: AppState, headers: HeaderMap, body: Bytes) -> HttpResponse {
    if !content_type_is_json(&headers) {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Type must be application/json",
        )
            .into_response();
    }

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            let envelope =
                Response::error(Value::Null, ErrorObject::parse_error(format!("invalid JSON: {e}")));
            return (StatusCode::BAD_REQUEST, Json(envelope)).into_response();
        }
    };

    let payload = match Payload::decode(value) {
        Ok(payload) => payload,
        Err(error) => {
            let envelope = Response::error(Value::Null, error);
            return (StatusCode::BAD_REQUEST, Json(envelope)).into_response();
        }
    };

    // Resolve the session: header first, then minting on initialize.
    let mut session = match session_id_header(&headers) {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };
    if session.is_none()
        && let Some(client_info) = initialize_client_info(&payload.messages)
    {
        session = Some(state.sessions.create(client_info).await);
    }

    if !payload.has_requests() {
        // Nothing owes a reply: acknowledge and return without opening any
        // stream. Notifications and late responses are still dispatched.
        let dispatcher = state.dispatcher.clone();
        let messages = payload.messages;
        for message in messages {
            let _ = dispatcher.dispatch_message(message).await;
        }
        return finalize(
            StatusCode::ACCEPTED.into_response(),
            session.as_ref(),
            &headers,
        );
    }

    let Some(session) = session else {
        return (StatusCode::UNAUTHORIZED, "session required").into_response();
    };

    let accept = accept_header(&headers);
    if accept.contains("text/event-stream") {
        sse_reply(&state, &session, payload, &headers)
    } else if accept.contains("application/json") || accept.contains("*/*") {
        json_reply(&state, &session, payload, &headers).await
    } else {
        (
            StatusCode::NOT_ACCEPTABLE,
            "Accept must include application/json or text/event-stream",
        )
            .into_response()
    }
}

/// Dispatches the batch and answers with a single JSON body: a bare object
/// when a bare object arrived, an array otherwise.
async fn json_reply(
    state: &AppState,
    session: &Arc<Session>,
    payload: Payload,
    headers: &HeaderMap,
) -> HttpResponse {
    let dispatcher = state.dispatcher.clone();
    let batched = payload.batched;
    let messages = payload.messages;

    // A panicking handler must become a 500 envelope, never a dropped
    // connection; the spawn boundary catches it.
    let handle = tokio::spawn(async move {
        let mut replies = Vec::new();
        for message in messages {
            if let Some(response) = dispatcher.dispatch_message(message).await {
                replies.push(response);
            }
        }
        replies
    });

    let replies = match handle.await {
        Ok(replies) => replies,
        Err(e) => {
            warn!(error = %e, "request handler failed");
            let envelope = Response::error(
                Value::Null,
                ErrorObject::internal_error("request handler failed"),
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response();
        }
    };

    let body = if batched {
        Json(serde_json::to_value(replies).unwrap_or(Value::Null)).into_response()
    } else {
        match replies.into_iter().next() {
            Some(single) => Json(single).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        }
    };
    finalize(body, Some(session), headers)
}

/// Opens a call-scoped SSE stream, dispatches every envelope concurrently,
/// and closes the stream once every expected request id has been answered.
fn sse_reply(
    state: &AppState,
    session: &Arc<Session>,
    payload: Payload,
    headers: &HeaderMap,
) -> HttpResponse {
    let (stream_id, rx) = session.register_stream();
    let expected: HashSet<String> = payload
        .request_ids()
        .iter()
        .map(Value::to_string)
        .collect();

    let dispatcher = state.dispatcher.clone();
    let dispatch_session = Arc::clone(session);
    tokio::spawn(dispatch_batch(
        dispatcher,
        dispatch_session,
        stream_id,
        payload.messages,
        expected,
    ));

    let guard = StreamGuard {
        session: Arc::clone(session),
        stream_id,
    };
    let events = ReceiverStream::new(rx).map(move |frame| {
        // The guard lives as long as the stream; dropping it (client
        // disconnect or normal close) deregisters the sink.
        let _ = &guard;
        Ok::<Event, Infallible>(
            Event::default()
                .id(frame.event_id.to_string())
                .event("message")
                .data(frame.json),
        )
    });

    let response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    finalize(response, Some(session), headers)
}

/// Runs every envelope of one POST batch, pushing responses onto the
/// call-scoped stream as they complete. Requests run as independent tasks:
/// a later request may finish, and be delivered, before an earlier one.
async fn dispatch_batch(
    dispatcher: Dispatcher,
    session: Arc<Session>,
    stream_id: StreamId,
    messages: Vec<Message>,
    mut pending: HashSet<String>,
) {
    let mut tasks = JoinSet::new();
    for message in messages {
        let dispatcher = dispatcher.clone();
        tasks.spawn(async move { dispatcher.dispatch_message(message).await });
    }

    let mut receiver_gone = false;
    while let Some(joined) = tasks.join_next().await {
        let response = match joined {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "request handler failed");
                Response::error(
                    Value::Null,
                    ErrorObject::internal_error("request handler failed"),
                )
            }
        };
        pending.remove(&response.id.to_string());
        let json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                continue;
            }
        };
        if !session.push_to_stream(stream_id, json).await {
            // Stream gone: the client disconnected or the session was
            // deleted. Remaining results are discarded, not written to a
            // dead socket.
            receiver_gone = true;
            break;
        }
    }

    if !receiver_gone && !pending.is_empty() {
        warn!(
            unanswered = pending.len(),
            "closing reply stream with unanswered request ids"
        );
    }
    session.deregister_stream(stream_id);
}

// ---------------------------------------------------------------------------
// GET: standing server → client push channel
// ---------------------------------------------------------------------------

/// Deregisters a stream when its HTTP response body is dropped.
struct StreamGuard {
    session: Arc<Session>,
    stream_id: StreamId,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.session.deregister_stream(self.stream_id);
    }
}

async fn handle_get(state: AppState, headers: HeaderMap) -> HttpResponse {
    if !accept_header(&headers).contains("text/event-stream") {
        return (
            StatusCode::NOT_ACCEPTABLE,
            "Accept must include text/event-stream",
        )
            .into_response();
    }

    let Some(id) = session_id_header(&headers) else {
        return (StatusCode::UNAUTHORIZED, "session required").into_response();
    };
    let Some(session) = state.sessions.get(id).await else {
        return (StatusCode::NOT_FOUND, "session not found or expired").into_response();
    };

    if let Some(last_event_id) = headers.get("last-event-id").and_then(|v| v.to_str().ok()) {
        // Acknowledged but not replayed; event ids stay monotonic per
        // session so a replay log can be added behind this point.
        debug!(session_id = %session.id(), last_event_id, "resumption requested");
    }

    let (stream_id, rx) = session.register_stream();
    debug!(session_id = %session.id(), stream_id, "push channel opened");

    let guard = StreamGuard {
        session: Arc::clone(&session),
        stream_id,
    };
    let connected = stream::once(std::future::ready(Ok::<Event, Infallible>(
        Event::default().comment("connected"),
    )));
    let events = ReceiverStream::new(rx).map(move |frame| {
        let _ = &guard;
        Ok::<Event, Infallible>(
            Event::default()
                .id(frame.event_id.to_string())
                .event("message")
                .data(frame.json),
        )
    });

    let response = Sse::new(connected.chain(events))
        .keep_alive(KeepAlive::default())
        .into_response();
    finalize(response, Some(&session), &headers)
}

// ---------------------------------------------------------------------------
// DELETE: session teardown
// ---------------------------------------------------------------------------

async fn handle_delete(state: AppState, headers: HeaderMap) -> HttpResponse {
    let Some(id) = session_id_header(&headers) else {
        return (StatusCode::UNAUTHORIZED, "session required").into_response();
    };
    if state.sessions.delete(id).await {
        info!(session_id = %id, "session terminated by client");
        StatusCode::NO_CONTENT.into_response()
    } else {
        (StatusCode::NOT_FOUND, "session not found").into_response()
    }
}
