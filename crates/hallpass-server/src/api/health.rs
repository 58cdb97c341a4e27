//! Health check API endpoint.
//!
//! Reports whether the pass store answers, plus enough clock and class
//! context for a kiosk operator to spot a misconfigured timezone.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::state::{run_blocking, AppState, SharedState};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "database": "ok",
    "classes": 3,
    "timezone": "America/Chicago",
    "today": "2025-10-28"
}))]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database does not answer.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// `ok` or `unreachable`.
    #[schema(example = "ok")]
    pub database: String,

    /// Number of configured classes.
    #[schema(example = 3)]
    pub classes: usize,

    /// Timezone used for attendance days.
    #[schema(example = "America/Chicago")]
    pub timezone: String,

    /// Current attendance day in that timezone.
    #[schema(example = "2025-10-28")]
    pub today: String,
}

/// Creates the health router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health_check))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Pings the database and reports the attendance day. Answers 503 \
        with the same body when the database is unreachable.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = run_blocking(&state, |s| s.passes.check_storage()).await;
    if let Err(e) = &storage {
        warn!(error = %e, "Health check: database unreachable");
    }
    let (status, body) = health_report(&state, storage.is_ok());
    (status, Json(body))
}

fn health_report(state: &AppState, database_ok: bool) -> (StatusCode, HealthResponse) {
    let (status, health, database) = if database_ok {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable")
    };
    let body = HealthResponse {
        status: health.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        classes: state.config.classes.len(),
        timezone: state.config.attendance.timezone.clone(),
        today: state.attendance.today().format("%Y-%m-%d").to_string(),
    };
    (status, body)
}
