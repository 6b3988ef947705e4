use super::{INSTRUCTIONS, PROTOCOL_VERSION, SERVER_NAME};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ToolContent {
    r#type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ToolCallResult {
    content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// One decoded inbound message.
#[derive(Debug)]
pub enum Incoming {
    Request(JsonRpcRequest),
    /// No `id`: the sender expects no response.
    Notification { method: String },
    /// Undecodable input, already turned into an error response.
    Invalid(JsonRpcResponse),
}

pub fn decode(raw: &[u8]) -> Incoming {
    let value: Value = match serde_json::from_slice(raw) {
        Ok(v) => v,
        Err(e) => {
            return Incoming::Invalid(JsonRpcResponse::failure(
                None,
                PARSE_ERROR,
                format!("parse error: {e}"),
            ))
        }
    };

    // Notifications have no "id" key — do not respond
    let Some(obj) = value.as_object() else {
        return Incoming::Invalid(JsonRpcResponse::failure(
            None,
            INVALID_REQUEST,
            "invalid request: expected a JSON object",
        ));
    };
    if !obj.contains_key("id") {
        let method = obj
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Incoming::Notification { method };
    }

    let id = obj.get("id").cloned();
    match serde_json::from_value(value) {
        Ok(request) => Incoming::Request(request),
        Err(e) => Incoming::Invalid(JsonRpcResponse::failure(
            id,
            INVALID_REQUEST,
            format!("invalid request: {e}"),
        )),
    }
}

/// Decode and dispatch one message. `None` means nothing should be sent back.
pub async fn handle_message(raw: &[u8], app: &AppState) -> Option<JsonRpcResponse> {
    match decode(raw) {
        Incoming::Request(req) => Some(handle_request(&req, app).await),
        Incoming::Notification { method } => {
            tracing::debug!(%method, "MCP notification");
            None
        }
        Incoming::Invalid(resp) => Some(resp),
    }
}

// ---------------------------------------------------------------------------
// Request dispatch (pub for unit tests)
// ---------------------------------------------------------------------------

pub async fn handle_request(req: &JsonRpcRequest, app: &AppState) -> JsonRpcResponse {
    let id = req.id.clone();
    match req.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                },
                "instructions": INSTRUCTIONS
            }),
        ),

        "ping" => JsonRpcResponse::success(id, serde_json::json!({})),

        "tools/list" => {
            let tool_list: Vec<Value> = app
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name(),
                        "description": t.description(),
                        "inputSchema": t.schema()
                    })
                })
                .collect();
            JsonRpcResponse::success(id, serde_json::json!({ "tools": tool_list }))
        }

        "tools/call" => {
            let Some(params) = &req.params else {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, "missing params");
            };
            let Some(tool_name) = params["name"].as_str() else {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, "missing tool name in params");
            };
            let args = match params.get("arguments") {
                None | Some(Value::Null) => Value::Object(Default::default()),
                Some(v @ Value::Object(_)) => v.clone(),
                Some(_) => {
                    return JsonRpcResponse::failure(
                        id,
                        INVALID_PARAMS,
                        "arguments must be an object",
                    )
                }
            };

            let Some(tool) = app.tools.iter().find(|t| t.name() == tool_name) else {
                return JsonRpcResponse::failure(
                    id,
                    METHOD_NOT_FOUND,
                    format!("tool not found: {tool_name}"),
                );
            };

            tracing::info!(tool = tool_name, "MCP tool call");
            let (text, is_error) = match tool.call(args, app).await {
                Ok(v) => (
                    serde_json::to_string_pretty(&v)
                        .unwrap_or_else(|e| format!("serialization error: {e}")),
                    false,
                ),
                Err(e) => {
                    tracing::error!(tool = tool_name, error = %e, "MCP tool failed");
                    (e, true)
                }
            };

            let call_result = ToolCallResult {
                content: vec![ToolContent {
                    r#type: "text",
                    text,
                }],
                is_error,
            };
            JsonRpcResponse::success(
                id,
                serde_json::to_value(&call_result)
                    .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()})),
            )
        }

        other => JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("method not found: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
