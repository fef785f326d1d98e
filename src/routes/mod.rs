//! HTTP route handlers.
//!
//! `/mcp` requires authentication via [`crate::auth::require_api_key`];
//! `/api/health` and `/api/events` are public.

pub mod events;
pub mod health;
pub mod rpc;
