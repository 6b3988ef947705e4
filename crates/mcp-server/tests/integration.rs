use axum::http::StatusCode;
use http_body_util::BodyExt;
use mattermost_client::MattermostClient;
use mattermost_mcp_server::{build_router, AppState};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ME: &str = r#"{"id": "bot1", "username": "monitor-bot", "is_bot": true}"#;

fn app_for(url: &str) -> axum::Router {
    let client = MattermostClient::new(url, "test-token", "team1").unwrap();
    build_router(AppState::new(Arc::new(client), None))
}

/// Nothing listens on port 9 (discard); connections are refused.
fn offline_app() -> axum::Router {
    app_for("http://127.0.0.1:9")
}

async fn logged_in_server() -> ServerGuard {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v4/users/me")
        .with_status(200)
        .with_body(ME)
        .create_async()
        .await;
    server
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// POST raw bytes to the MCP endpoint; returns the full response parts.
async fn post_mcp_raw(
    app: axum::Router,
    body: Vec<u8>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/llm/mcp")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

async fn post_mcp(app: axum::Router, msg: Value) -> (StatusCode, Value) {
    let (status, _, body) = post_mcp_raw(app, serde_json::to_vec(&msg).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn call(name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

/// Parse the JSON payload a successful tool call wraps in text content.
fn tool_payload(resp: &Value) -> Value {
    assert_eq!(resp["result"]["isError"], false, "tool failed: {resp}");
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_always_ok() {
    let (status, body) = get(offline_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn root_lists_endpoints() {
    let (status, body) = get(offline_app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "mattermost-mcp");
    assert_eq!(body["mcp_endpoint"], "/llm/mcp");
    assert_eq!(body["health_endpoint"], "/health");
    assert_eq!(body["ready_endpoint"], "/ready");
}

#[tokio::test]
async fn ready_is_503_when_mattermost_unreachable() {
    let (status, body) = get(offline_app(), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["mattermost_connected"], false);
}

#[tokio::test]
async fn ready_is_503_when_token_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v4/users/me")
        .with_status(401)
        .with_body(r#"{"message": "Invalid or expired session"}"#)
        .create_async()
        .await;
    let (status, body) = get(app_for(&server.url()), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["mattermost_connected"], false);
}

#[tokio::test]
async fn ready_when_connected() {
    let server = logged_in_server().await;
    let (status, body) = get(app_for(&server.url()), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["mattermost_connected"], true);
}

// ---------------------------------------------------------------------------
// MCP transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_sets_session_header() {
    let msg = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
    let (status, headers, body) =
        post_mcp_raw(offline_app(), serde_json::to_vec(&msg).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let session = headers.get("mcp-session-id").unwrap().to_str().unwrap();
    assert_eq!(session.len(), 36);

    let resp: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(resp["result"]["serverInfo"]["name"], "mattermost-mcp");
    assert!(resp["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn notification_is_accepted_without_body() {
    let msg = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let (status, _, body) = post_mcp_raw(offline_app(), serde_json::to_vec(&msg).unwrap()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());
}

#[tokio::test]
async fn malformed_json_is_400_parse_error() {
    let (status, _, body) = post_mcp_raw(offline_app(), b"{not json".to_vec()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let resp: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(resp["error"]["code"], -32700);
}

#[tokio::test]
async fn get_on_mcp_endpoint_is_405() {
    let (status, _) = get(offline_app(), "/llm/mcp").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn tools_list_returns_all_tools() {
    let msg = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
    let (status, resp) = post_mcp(offline_app(), msg).await;
    assert_eq!(status, StatusCode::OK);
    let tools = resp["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 10);
    assert!(tools
        .iter()
        .all(|t| t["inputSchema"]["type"] == "object" && t["description"].is_string()));
}

#[tokio::test]
async fn unknown_method_is_32601() {
    let msg = json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"});
    let (_, resp) = post_mcp(offline_app(), msg).await;
    assert_eq!(resp["error"]["code"], -32601);
}

// ---------------------------------------------------------------------------
// Tools against a mock Mattermost
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_channels_clamps_limit() {
    let mut server = logged_in_server().await;
    server
        .mock("GET", "/api/v4/teams/team1/channels")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "200".into()),
            Matcher::UrlEncoded("page".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"[{"id": "c1", "name": "town-square", "display_name": "Town Square", "type": "O", "total_msg_count": 12}]"#,
        )
        .create_async()
        .await;

    let (_, resp) = post_mcp(
        app_for(&server.url()),
        call("mattermost_list_channels", json!({"limit": 500})),
    )
    .await;
    let payload = tool_payload(&resp);
    assert_eq!(payload["per_page"], 200);
    assert_eq!(payload["total_count"], 1);
    assert_eq!(payload["channels"][0]["name"], "town-square");
    assert_eq!(payload["channels"][0]["type"], "O");
}

#[tokio::test]
async fn channel_history_in_order() {
    let mut server = logged_in_server().await;
    server
        .mock("GET", "/api/v4/channels/c1/posts")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{
                "order": ["p2", "p1", "ghost"],
                "posts": {
                    "p1": {"id": "p1", "user_id": "u1", "message": "first", "create_at": 1704067200000},
                    "p2": {"id": "p2", "user_id": "u2", "message": "reply", "root_id": "p1", "create_at": 1704067260000}
                },
                "next_post_id": "",
                "prev_post_id": "p0"
            }"#,
        )
        .create_async()
        .await;

    let (_, resp) = post_mcp(
        app_for(&server.url()),
        call("mattermost_get_channel_history", json!({"channel_id": "c1"})),
    )
    .await;
    let payload = tool_payload(&resp);
    let posts = payload["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["id"], "p2");
    assert_eq!(posts[0]["root_id"], "p1");
    assert_eq!(posts[1]["root_id"], Value::Null);
    assert_eq!(posts[1]["create_at"], "2024-01-01T00:00:00+00:00");
    assert_eq!(payload["has_next"], false);
    assert_eq!(payload["has_prev"], true);
    assert_eq!(payload["per_page"], 30);
}

#[tokio::test]
async fn missing_argument_is_a_tool_error() {
    let (status, resp) = post_mcp(
        offline_app(),
        call("mattermost_post_message", json!({"channel_id": "c1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["result"]["isError"], true);
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("message"), "{text}");
}

#[tokio::test]
async fn upstream_failure_is_a_tool_error() {
    let (_, resp) = post_mcp(offline_app(), call("mattermost_get_users", json!({}))).await;
    assert_eq!(resp["result"]["isError"], true);
}

#[tokio::test]
async fn reply_to_thread_posts_root_id() {
    let mut server = logged_in_server().await;
    let create = server
        .mock("POST", "/api/v4/posts")
        .match_body(Matcher::PartialJson(json!({
            "channel_id": "c1",
            "message": "on it",
            "root_id": "p1"
        })))
        .with_status(201)
        .with_body(
            r#"{"id": "p9", "channel_id": "c1", "root_id": "p1", "message": "on it", "create_at": 1704067200000}"#,
        )
        .create_async()
        .await;

    let (_, resp) = post_mcp(
        app_for(&server.url()),
        call(
            "mattermost_reply_to_thread",
            json!({"channel_id": "c1", "post_id": "p1", "message": "on it"}),
        ),
    )
    .await;
    let payload = tool_payload(&resp);
    assert_eq!(payload["id"], "p9");
    assert_eq!(payload["root_id"], "p1");
    create.assert_async().await;
}

#[tokio::test]
async fn monitoring_status_without_monitor() {
    let (_, resp) = post_mcp(
        offline_app(),
        call("mattermost_get_monitoring_status", json!({})),
    )
    .await;
    let payload = tool_payload(&resp);
    assert_eq!(payload["enabled"], false);
    assert_eq!(payload["message"], "Monitoring is not enabled or not initialized");
}
