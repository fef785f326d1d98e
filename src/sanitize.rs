//! Credential removal for inventory projections.
//!
//! Any structure derived from the inventory passes through [`sanitize`]
//! before it leaves the process: host listings, host detail, group listings,
//! and the `inventory://` resources. Credential-bearing keys are removed
//! entirely, never masked with a placeholder.

use serde_json::Value;

/// Keys stripped from every mapping, compared case-insensitively.
const SENSITIVE_KEYS: [&str; 3] = ["username", "password", "secret"];

/// Recursively remove credential-bearing keys from `value`.
///
/// Mappings lose any key case-insensitively equal to `username`, `password`,
/// or `secret`; sequences are sanitized element-wise; scalars pass through
/// unchanged. Idempotent.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_sensitive(key))
                .map(|(key, inner)| (key, sanitize(inner)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        scalar => scalar,
    }
}

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS
        .iter()
        .any(|sensitive| key.eq_ignore_ascii_case(sensitive))
}
