use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::mcp::protocol::{decode, handle_request, Incoming};
use crate::state::AppState;

pub const SESSION_HEADER: &str = "mcp-session-id";

/// POST /llm/mcp — one JSON-RPC message per request.
///
/// Requests get their response as JSON. Notifications get `202 Accepted`
/// with no body. Undecodable messages get the JSON-RPC error with `400`.
pub async fn post_message(State(app): State<AppState>, body: Bytes) -> Response {
    match decode(&body) {
        Incoming::Notification { method } => {
            tracing::debug!(%method, "MCP notification");
            StatusCode::ACCEPTED.into_response()
        }
        Incoming::Invalid(resp) => (StatusCode::BAD_REQUEST, Json(resp)).into_response(),
        Incoming::Request(req) => {
            let resp = handle_request(&req, &app).await;
            let start_session = req.method == "initialize" && resp.error.is_none();
            let mut response = Json(resp).into_response();
            if start_session {
                let session_id = uuid::Uuid::new_v4().to_string();
                tracing::info!(%session_id, "MCP session initialized");
                if let Ok(value) = HeaderValue::from_str(&session_id) {
                    response.headers_mut().insert(SESSION_HEADER, value);
                }
            }
            response
        }
    }
}

/// GET /llm/mcp — server-initiated streams are not offered.
pub async fn get_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}
