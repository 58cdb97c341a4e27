//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `checkin` - Daily attendance check-in and listing
//! - `passes` - Hall pass checkout, check-in and history
//! - `config` - Class configuration for the front end
//! - `reports` - CSV exports, attendance summary and roster
//! - `health` - Service health checks
//! - `error` - API error types
//! - `extract` - Extractors that reject with the API error body
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use hallpass_core::ClassConfig;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::{AppState, SharedState};

pub mod checkin;
pub mod config;
pub mod error;
pub mod extract;
pub mod health;
pub mod openapi;
pub mod passes;
pub mod reports;

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};

// Re-export OpenAPI utilities for the gen-openapi binary
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                    - Health check
/// /config                    - Class list and default class
/// /checkin                   - Daily check-in
/// /photos/*                  - Stored photos
/// /docs                      - Swagger UI
/// /api
/// ├── /attendance            - Attendance for a class and day
/// ├── /attendance/export     - Attendance sheet as CSV
/// ├── /attendance/summary    - Attendance rates per student
/// ├── /roster                - Class roster
/// ├── /hall-pass             - Hall pass lifecycle and history
/// └── /openapi.json          - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    let photos = ServeDir::new(state.photos.root());

    Router::new()
        .nest("/health", health::router())
        .merge(config::router())
        .merge(checkin::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .merge(checkin::api_router())
                .merge(reports::api_router())
                .nest("/hall-pass", passes::router()),
        )
        .with_state(state)
        .nest_service("/photos", photos)
        .merge(SwaggerUi::new("/docs").config(utoipa_swagger_ui::Config::from("/api/openapi.json")))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// The requested class, or the default class when `class_id` is absent or
/// unknown.
pub(crate) fn resolve_class<'a>(
    state: &'a AppState,
    class_id: Option<&str>,
) -> ApiResult<&'a ClassConfig> {
    state
        .config
        .class_or_default(class_id)
        .ok_or_else(|| ApiError::bad_request("INVALID_CLASS", "Invalid class configuration"))
}
