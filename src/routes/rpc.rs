//! JSON-RPC over HTTP endpoint.
//!
//! `POST /mcp` — one JSON-RPC request per call, handled by
//! [`crate::mcp::handle_message`]. Notifications return `202 Accepted` with
//! no body.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::mcp;
use crate::state::AppState;

/// `POST /mcp` — handle one MCP JSON-RPC message.
pub async fn rpc(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    match mcp::handle_message(&state, &payload).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
