//! End-to-end tests for the streamable HTTP transport, driving the router
//! directly with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use dkr_rs::config::ServerConfig;
use dkr_rs::protocol::Dispatcher;
use dkr_rs::search::{Document, SearchService};
use dkr_rs::session::SessionStore;
use dkr_rs::tools::{SearchTool, ToolCatalog};
use dkr_rs::transport::{AppState, SESSION_HEADER, router};

const ENDPOINT: &str = "/mcp";

fn knowledge() -> Vec<Document> {
    [
        ("sessions", "sessions expire after an idle timeout"),
        ("transport", "streamable http transport with sse push channels"),
        ("ranking", "hybrid ranking combines dense and sparse scores"),
    ]
    .into_iter()
    .map(|(id, text)| Document {
        id: Some(id.to_string()),
        text: text.to_string(),
        metadata: Value::Null,
    })
    .collect()
}

async fn test_app_with(config: ServerConfig) -> Router {
    let service = SearchService::in_memory(knowledge())
        .await
        .unwrap_or_else(|_| unreachable!());
    let catalog = ToolCatalog::new().with_tool(Arc::new(SearchTool::new(
        Arc::new(service),
        config.max_results,
    )));
    let dispatcher = Dispatcher::new(Arc::new(catalog));
    let sessions = Arc::new(SessionStore::new(config.session_timeout));
    router(AppState::new(dispatcher, sessions, Arc::new(config)))
}

async fn test_app() -> Router {
    test_app_with(ServerConfig::default()).await
}

fn post_request(body: Value, session: Option<&str>, accept: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, accept);
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| unreachable!())
}

fn post_json(body: Value, session: Option<&str>) -> Request<Body> {
    post_request(body, session, "application/json")
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map(|b| b.to_vec())
        .unwrap_or_default()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap_or(Value::Null)
}

fn session_id(response: &Response<Body>) -> String {
    response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {"clientInfo": {"name": "t", "version": "0.0.0"}}
    })
}

async fn initialized_session(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(post_json(initialize_body(), None))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
    let sid = session_id(&response);
    assert!(!sid.is_empty());
    sid
}

#[tokio::test]
async fn initialize_mints_session_and_call_tool_round_trips() {
    let app = test_app().await;

    // initialize: response carries serverInfo and a session header.
    let response = app
        .clone()
        .oneshot(post_json(initialize_body(), None))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
    let sid = session_id(&response);
    assert_eq!(sid.len(), 32);
    let body = body_json(response).await;
    assert!(body["result"]["serverInfo"]["name"].is_string());
    let advertised = body["result"]["tools"].clone();

    // tools/list under the same session returns what initialize advertised.
    let response = app
        .clone()
        .oneshot(post_json(
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            Some(&sid),
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"]["tools"], advertised);

    // tools/call returns a text content block holding the encoded outcome.
    let response = app
        .clone()
        .oneshot(post_json(
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {
                    "name": "query_domain_knowledge",
                    "arguments": {"query": "idle timeout"}
                }
            }),
            Some(&sid),
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let text = body["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_default();
    let outcome: Value = serde_json::from_str(text).unwrap_or(Value::Null);
    assert_eq!(outcome["success"], json!(true));
    assert!(outcome["results"].is_array());
    assert_eq!(outcome["results"][0]["id"], "sessions");
}

#[tokio::test]
async fn request_without_session_is_unauthorized() {
    let app = test_app().await;
    let response = app
        .oneshot(post_json(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "query_domain_knowledge", "arguments": {"query": "x"}}
            }),
            None,
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stale_session_is_rejected_after_timeout() {
    let config = ServerConfig {
        session_timeout: Duration::from_millis(40),
        ..ServerConfig::default()
    };
    let app = test_app_with(config).await;
    let sid = initialized_session(&app).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let response = app
        .oneshot(post_json(
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            Some(&sid),
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn notification_only_batch_is_accepted_with_empty_body() {
    let app = test_app().await;
    let response = app
        .oneshot(post_json(
            json!([
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "method": "notifications/progress"}
            ]),
            None,
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn reply_shape_follows_payload_shape() {
    let app = test_app().await;
    let sid = initialized_session(&app).await;

    // Bare object in, bare object out.
    let response = app
        .clone()
        .oneshot(post_json(
            json!({"jsonrpc": "2.0", "id": 10, "method": "ping"}),
            Some(&sid),
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    let body = body_json(response).await;
    assert!(body.is_object());
    assert_eq!(body["id"], 10);

    // Single-element array in, single-element array out.
    let response = app
        .clone()
        .oneshot(post_json(
            json!([{"jsonrpc": "2.0", "id": 11, "method": "ping"}]),
            Some(&sid),
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    let body = body_json(response).await;
    assert!(body.is_array());
    assert_eq!(body[0]["id"], 11);
}

#[tokio::test]
async fn malformed_batch_member_is_isolated() {
    let app = test_app().await;
    let sid = initialized_session(&app).await;
    let response = app
        .oneshot(post_json(
            json!([
                {"jsonrpc": "2.0", "id": 1, "method": "ping"},
                {"nonsense": true}
            ]),
            Some(&sid),
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    let body = body_json(response).await;
    let replies = body.as_array().cloned().unwrap_or_default();
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().any(|r| r["id"] == 1 && r["result"].is_object()));
    assert!(replies.iter().any(|r| r["error"]["code"] == json!(-32600)));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let app = test_app().await;
    let sid = initialized_session(&app).await;

    let delete = |sid: String| {
        Request::builder()
            .method("DELETE")
            .uri(ENDPOINT)
            .header(SESSION_HEADER, sid)
            .body(Body::empty())
            .unwrap_or_else(|_| unreachable!())
    };

    let response = app
        .clone()
        .oneshot(delete(sid.clone()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(delete(sid))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn origin_allow_list_is_enforced() {
    let config = ServerConfig {
        allowed_origins: vec!["https://a.test".to_string()],
        ..ServerConfig::default()
    };
    let app = test_app_with(config).await;

    let with_origin = |origin: Option<&str>| {
        let mut builder = Request::builder()
            .method("POST")
            .uri(ENDPOINT)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        builder
            .body(Body::from(initialize_body().to_string()))
            .unwrap_or_else(|_| unreachable!())
    };

    let response = app
        .clone()
        .oneshot(with_origin(Some("https://b.test")))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(with_origin(Some("https://a.test")))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("https://a.test")
    );

    let response = app
        .clone()
        .oneshot(with_origin(None))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn options_preflight_short_circuits() {
    let config = ServerConfig {
        allowed_origins: vec!["https://a.test".to_string()],
        ..ServerConfig::default()
    };
    let app = test_app_with(config).await;
    let request = Request::builder()
        .method("OPTIONS")
        .uri(ENDPOINT)
        .header(header::ORIGIN, "https://a.test")
        .body(Body::empty())
        .unwrap_or_else(|_| unreachable!());
    let response = app.oneshot(request).await.unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("https://a.test")
    );
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
}

#[tokio::test]
async fn routing_rejections() {
    let app = test_app().await;

    // Unknown path.
    let request = Request::builder()
        .method("POST")
        .uri("/other")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap_or_else(|_| unreachable!());
    let response = app
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Unsupported method carries an Allow header.
    let request = Request::builder()
        .method("PATCH")
        .uri(ENDPOINT)
        .body(Body::empty())
        .unwrap_or_else(|_| unreachable!());
    let response = app
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let allow = response
        .headers()
        .get(header::ALLOW)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(allow.contains("POST"));
    assert!(allow.contains("OPTIONS"));

    // Wrong content type.
    let request = Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap_or_else(|_| unreachable!());
    let response = app
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // Invalid JSON body: 400 with a ParseError envelope, id null.
    let request = Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap_or_else(|_| unreachable!());
    let response = app
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], json!(-32700));
    assert_eq!(body["id"], Value::Null);

    // Accept matching neither reply mode.
    let response = app
        .clone()
        .oneshot(post_request(initialize_body(), None, "text/plain"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn post_sse_branch_streams_one_event_per_request_then_closes() {
    let app = test_app().await;
    let sid = initialized_session(&app).await;

    let response = app
        .oneshot(post_request(
            json!([
                {"jsonrpc": "2.0", "id": 21, "method": "ping"},
                {"jsonrpc": "2.0", "id": 22, "method": "tools/list"}
            ]),
            Some(&sid),
            "text/event-stream",
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );

    // The stream closes once every expected request id has been answered,
    // so reading the whole body terminates.
    let body = String::from_utf8(body_bytes(response).await).unwrap_or_default();
    assert_eq!(body.matches("event: message").count(), 2);
    assert!(body.contains("\"id\":21"));
    assert!(body.contains("\"id\":22"));
    assert!(body.contains("id: 0"));
    assert!(body.contains("id: 1"));
}

#[tokio::test]
async fn get_opens_push_channel_bound_to_session() {
    let app = test_app().await;
    let sid = initialized_session(&app).await;

    let get = |sid: Option<&str>, accept: &str| {
        let mut builder = Request::builder()
            .method("GET")
            .uri(ENDPOINT)
            .header(header::ACCEPT, accept);
        if let Some(sid) = sid {
            builder = builder.header(SESSION_HEADER, sid);
        }
        builder
            .body(Body::empty())
            .unwrap_or_else(|_| unreachable!())
    };

    // Missing Accept.
    let response = app
        .clone()
        .oneshot(get(Some(&sid), "application/json"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    // Missing session header.
    let response = app
        .clone()
        .oneshot(get(None, "text/event-stream"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Unknown session.
    let response = app
        .clone()
        .oneshot(get(Some("deadbeef"), "text/event-stream"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Happy path: standing stream, not consumed here.
    let response = app
        .clone()
        .oneshot(get(Some(&sid), "text/event-stream"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    assert_eq!(session_id(&response), sid);
}

#[tokio::test]
async fn call_tool_validation_failure_stays_a_tool_result() {
    let app = test_app().await;
    let sid = initialized_session(&app).await;
    let response = app
        .oneshot(post_json(
            json!({
                "jsonrpc": "2.0",
                "id": 5,
                "method": "tools/call",
                "params": {
                    "name": "query_domain_knowledge",
                    "arguments": {"query": "x", "scoreThreshold": 1.01}
                }
            }),
            Some(&sid),
        ))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let text = body["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_default();
    let outcome: Value = serde_json::from_str(text).unwrap_or(Value::Null);
    assert_eq!(outcome["success"], json!(false));
    assert!(
        outcome["error"]
            .as_str()
            .unwrap_or_default()
            .contains("scoreThreshold")
    );
}
