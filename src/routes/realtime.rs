use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{extract::State, Router};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::response::AppError;
use crate::state::AppState;

/// One local client normally; a handful of dev tools on top is plenty.
const MAX_SSE_CONNECTIONS: usize = 16;

static SSE_CONNECTION_COUNT: AtomicUsize = AtomicUsize::new(0);

struct SseGuard;
impl Drop for SseGuard {
    fn drop(&mut self) {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(sse_handler))
}

fn json_event(name: &str, payload: &impl serde::Serialize) -> Option<Event> {
    serde_json::to_string(payload)
        .ok()
        .map(|json| Event::default().event(name).data(json))
}

/// Streams a `snapshot` on connect, then one `progress` event per state
/// change. A subscriber that falls behind gets a fresh `snapshot` instead of
/// the changes it missed.
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let current = SSE_CONNECTION_COUNT.fetch_add(1, Ordering::SeqCst);
    if current >= MAX_SSE_CONNECTIONS {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
        return Err(AppError::service_unavailable("Too many SSE connections"));
    }

    let mut shutdown_rx = state.shutdown_rx();
    let mut changes = state.progress().subscribe();
    let progress = state.progress_handle();

    let stream = async_stream::stream! {
        let _guard = SseGuard;

        if let Some(event) = json_event("snapshot", &progress.snapshot()) {
            yield Ok(event);
        }

        loop {
            tokio::select! {
                received = changes.recv() => match received {
                    Ok(change) => {
                        if let Some(event) = json_event("progress", &change) {
                            yield Ok(event);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "SSE subscriber lagged, resending snapshot");
                        if let Some(event) = json_event("snapshot", &progress.snapshot()) {
                            yield Ok(event);
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
