use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::progress::persistence::SaveMode;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let store_healthy = state
        .store()
        .get_progress_blob(&state.config().profile_id)
        .is_ok();
    let latency_us = start.elapsed().as_micros() as u64;
    let saver = state.progress().saver();

    Json(serde_json::json!({
        "status": if store_healthy { "ok" } else { "degraded" },
        "uptimeSecs": state.uptime_secs(),
        "store": {
            "healthy": store_healthy,
            "latencyUs": latency_us,
        },
        "persistence": {
            "mode": match saver.mode() {
                SaveMode::Persist => "persist",
                SaveMode::Skip => "skip",
            },
            "pendingWrite": saver.has_pending(),
            "writtenGeneration": saver.written_generation(),
        },
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().get_progress_blob(&state.config().profile_id) {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
