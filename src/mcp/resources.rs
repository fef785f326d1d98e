//! Inventory resources.
//!
//! Read-only `inventory://` views of the loaded inventory, all sanitized:
//!
//! - `inventory://hosts` — every host
//! - `inventory://hosts/{keyword}` — keyword-filtered hosts
//! - `inventory://groups` — group records

use serde_json::{json, Value};

use crate::state::AppState;

/// Resource entries for `resources/list`.
pub fn resource_definitions() -> Vec<Value> {
    vec![
        json!({
            "uri": "inventory://hosts",
            "name": "Inventory hosts",
            "description": "All inventory hosts with credentials removed. Append /{keyword} to filter.",
            "mimeType": "application/json"
        }),
        json!({
            "uri": "inventory://groups",
            "name": "Inventory groups",
            "description": "All inventory groups with credentials removed.",
            "mimeType": "application/json"
        }),
    ]
}

/// Handle `resources/read` for a JSON-RPC request.
pub async fn handle_resources_read(state: &AppState, request: &Value) -> Value {
    let uri = request
        .pointer("/params/uri")
        .and_then(Value::as_str)
        .unwrap_or("");

    match read_resource(state, uri).await {
        Some(contents) => {
            let text = serde_json::to_string_pretty(&contents).unwrap_or_default();
            json!({
                "jsonrpc": "2.0",
                "result": {
                    "contents": [{
                        "uri": uri,
                        "mimeType": "application/json",
                        "text": text
                    }]
                }
            })
        }
        None => json!({
            "jsonrpc": "2.0",
            "error": {
                "code": -32602,
                "message": format!("Unknown resource: {}", uri)
            }
        }),
    }
}

async fn read_resource(state: &AppState, uri: &str) -> Option<Value> {
    let inventory = state.inventory().await;
    match uri {
        "inventory://hosts" => Some(inventory.host_summaries(None, None)),
        "inventory://groups" => Some(inventory.group_listing()),
        _ => uri
            .strip_prefix("inventory://hosts/")
            .filter(|keyword| !keyword.is_empty())
            .map(|keyword| inventory.host_summaries(None, Some(keyword))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn hosts_resource_is_sanitized() {
        let state = test_state();
        let request = json!({"params": {"uri": "inventory://hosts"}});
        let response = handle_resources_read(&state, &request).await;
        let text = response["result"]["contents"][0]["text"].as_str().unwrap();
        assert!(text.contains("r1"));
        assert!(!text.contains("password"));
        assert!(!text.contains("coreSecret"));
    }

    #[tokio::test]
    async fn keyword_filter_narrows_hosts() {
        let state = test_state();
        let request = json!({"params": {"uri": "inventory://hosts/edge"}});
        let response = handle_resources_read(&state, &request).await;
        let text = response["result"]["contents"][0]["text"].as_str().unwrap();
        assert!(text.contains("r2"));
        assert!(!text.contains("\"r1\""));
    }

    #[tokio::test]
    async fn groups_resource_lists_groups() {
        let state = test_state();
        let request = json!({"params": {"uri": "inventory://groups"}});
        let response = handle_resources_read(&state, &request).await;
        let text = response["result"]["contents"][0]["text"].as_str().unwrap();
        assert!(text.contains("core"));
        assert!(!text.contains("coreSecret"));
    }

    #[tokio::test]
    async fn unknown_uri_is_an_error() {
        let state = test_state();
        let request = json!({"params": {"uri": "inventory://nope"}});
        let response = handle_resources_read(&state, &request).await;
        assert_eq!(response["error"]["code"], json!(-32602));
    }
}
