//! Server-Sent Events (SSE) heartbeat endpoint.
//!
//! `GET /api/events` — a periodic heartbeat stream for dashboards and
//! monitoring. Carries no dispatch or inventory state; it only signals that
//! the server is up.

use std::convert::Infallible;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;

use crate::state::AppState;

/// `GET /api/events` — SSE heartbeat stream.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let interval =
        tokio::time::interval(Duration::from_secs(state.config.server.sse_heartbeat_secs.max(1)));

    let stream = futures::stream::unfold(interval, |mut interval| async move {
        interval.tick().await;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let event = Event::default().event("heartbeat").data(
            json!({
                "timestamp": timestamp,
                "status": "ok",
            })
            .to_string(),
        );
        Some((Ok::<_, Infallible>(event), interval))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
