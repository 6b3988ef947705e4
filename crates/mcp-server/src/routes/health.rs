use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET / — service banner with the endpoint map.
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": crate::mcp::SERVER_NAME,
        "version": VERSION,
        "mcp_endpoint": crate::MCP_PATH,
        "health_endpoint": "/health",
        "ready_endpoint": "/ready",
    }))
}

/// GET /health — liveness; never touches Mattermost.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": VERSION,
    }))
}

/// GET /ready — readiness; 503 until Mattermost answers `users/me`.
pub async fn ready(State(app): State<AppState>) -> (StatusCode, Json<Value>) {
    let connected = match app.client.check_connection().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            false
        }
    };
    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if connected { "ready" } else { "not_ready" },
            "version": VERSION,
            "mattermost_connected": connected,
        })),
    )
}
