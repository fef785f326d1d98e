//! MCP (Model Context Protocol) JSON-RPC handler.
//!
//! Implements the [MCP specification](https://spec.modelcontextprotocol.io/)
//! as a transport-agnostic message handler: the HTTP route posts one request
//! per call, the stdio loop reads one per line. Both feed
//! [`handle_message`].
//!
//! ## Supported methods
//!
//! | Method            | Description                        |
//! |-------------------|------------------------------------|
//! | `initialize`      | Handshake, returns capabilities    |
//! | `tools/list`      | List available tool definitions    |
//! | `tools/call`      | Execute a tool and return result   |
//! | `resources/list`  | List inventory resources           |
//! | `resources/read`  | Read a sanitized inventory view    |
//! | `ping`            | Liveness check                     |
//!
//! Notifications (`notifications/initialized`, `notifications/cancelled`) are
//! acknowledged silently.

pub mod resources;
pub mod tools;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::state::AppState;

const SERVER_NAME: &str = "netfleet";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Handle one JSON-RPC message. Returns `None` for notifications (no id).
pub async fn handle_message(state: &AppState, request: &Value) -> Option<Value> {
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");

    // Notifications (no id) — acknowledge silently
    if id.is_none() {
        match method {
            "notifications/initialized" | "notifications/cancelled" => {}
            _ => warn!(method, "unknown notification"),
        }
        return None;
    }

    let response = match method {
        "initialize" => handle_initialize(),
        "tools/list" => json!({
            "jsonrpc": "2.0",
            "result": { "tools": tools::all_tool_definitions() }
        }),
        "tools/call" => handle_tools_call(state, request).await,
        "resources/list" => json!({
            "jsonrpc": "2.0",
            "result": { "resources": resources::resource_definitions() }
        }),
        "resources/read" => resources::handle_resources_read(state, request).await,
        "ping" => json!({ "jsonrpc": "2.0", "result": {} }),
        _ => json!({
            "jsonrpc": "2.0",
            "error": {
                "code": -32601,
                "message": format!("Method not found: {}", method)
            }
        }),
    };

    Some(inject_id(response, id))
}

/// Run the MCP server on stdio, processing JSON-RPC requests until EOF.
pub async fn run_stdio(state: AppState) {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                warn!("stdin read error: {e}");
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32700,
                        "message": format!("Parse error: {}", e)
                    }
                });
                write_response(&mut stdout, &response).await;
                continue;
            }
        };

        if let Some(response) = handle_message(&state, &request).await {
            write_response(&mut stdout, &response).await;
        }
    }
}

/// Handle `initialize` — return protocol version, capabilities, and server info.
fn handle_initialize() -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        }
    })
}

/// Handle `tools/call` — dispatch to the appropriate tool handler.
async fn handle_tools_call(state: &AppState, request: &Value) -> Value {
    let params = request.get("params").cloned().unwrap_or(json!({}));
    let name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let args = params.get("arguments").cloned().unwrap_or(json!({}));

    let result = tools::handle_tool_call(state, name, &args).await;

    let mut response_result = json!({
        "content": result.content
    });
    if result.is_error {
        response_result["isError"] = json!(true);
    }

    json!({
        "jsonrpc": "2.0",
        "result": response_result
    })
}

/// Inject the request `id` into a response object.
fn inject_id(mut response: Value, id: Option<Value>) -> Value {
    if let Some(id) = id {
        response["id"] = id;
    }
    response
}

/// Write a JSON-RPC response to stdout (one line, flushed immediately).
async fn write_response(stdout: &mut tokio::io::Stdout, response: &Value) {
    let mut output = serde_json::to_string(response).unwrap_or_default();
    output.push('\n');
    if let Err(e) = stdout.write_all(output.as_bytes()).await {
        warn!("stdout write error: {e}");
    }
    if let Err(e) = stdout.flush().await {
        warn!("stdout flush error: {e}");
    }
}
