use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::HealthResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Whether the favorability store answers; "degraded" (503) means event writes
/// will report `store_unavailable` and reads fall back to the default score.
fn store_status(store_reachable: bool) -> (StatusCode, &'static str) {
    if store_reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    }
}

/// Liveness plus favorability store reachability
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Scoring engine and store are up", body = HealthResponse),
        (status = 503, description = "Favorability store unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_reachable = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    let (code, status) = store_status(store_reachable);
    let engine = &state.engine;

    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        scoring_enabled: engine.config().enabled,
        tracked_persons: engine.rate_limiter().len().await,
    };
    (code, Json(body))
}
