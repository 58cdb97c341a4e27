//! OpenAPI specification generation for the hallpass API.
//!
//! The document is served at `/api/openapi.json`, browsable at `/docs`, and
//! written to disk by the `gen-openapi` binary for front-end client
//! generation.

use axum::Json;
use hallpass_core::{
    AttendanceRecord, AttendanceSummary, Pass, PassStatus, Student, StudentAttendance,
};
use utoipa::OpenApi;

use super::checkin::{AttendanceResponse, CheckInRequest, CheckInResponse};
use super::config::{ClassSummary, ConfigResponse};
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::passes::{CheckinByIdRequest, CheckinRequest, CheckoutRequest, PassResponse};
use super::reports::RosterResponse;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for hallpass.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "hallpass API",
        version = "0.1.0",
        description = r#"
# hallpass API

Classroom attendance and hall-pass tracking for a single classroom kiosk.

## Overview

1. **Attendance**: Students check in once per day with their s-number and a photo.
   Repeat check-ins on the same day return `already`.
2. **Hall passes**: A student leaving the room checks out a pass and checks back in
   on return. Passes past their expected duration turn `overdue`.
3. **Reports**: CSV downloads of the pass log and a day's attendance, attendance
   rates per student, and the class roster.
4. **Configuration**: Classes and the default class for the kiosk picker.

Every failure returns `{"ok": false, "error": "...", "code": "..."}`.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local hallpass server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "attendance", description = "Daily photo-verified check-in"),
        (name = "hall-pass", description = "Hall pass checkout, check-in and history"),
        (name = "reports", description = "Exports, attendance summary and roster"),
        (name = "config", description = "Class configuration for the front end")
    ),
    paths(
        super::health::health_check,
        super::checkin::check_in,
        super::checkin::get_attendance,
        super::passes::checkout,
        super::passes::checkin,
        super::passes::checkin_by_id,
        super::passes::get_active_pass,
        super::passes::get_status,
        super::passes::get_history,
        super::passes::get_pass,
        super::reports::export_passes,
        super::reports::export_attendance,
        super::reports::get_attendance_summary,
        super::reports::get_roster,
        super::config::get_config,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            CheckInRequest,
            CheckInResponse,
            AttendanceResponse,
            AttendanceRecord,
            Student,
            CheckoutRequest,
            CheckinRequest,
            CheckinByIdRequest,
            PassResponse,
            Pass,
            PassStatus,
            AttendanceSummary,
            StudentAttendance,
            RosterResponse,
            ConfigResponse,
            ClassSummary,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "hallpass API");
        assert!(spec.paths.paths.contains_key("/api/hall-pass/checkout"));
        assert!(spec.paths.paths.contains_key("/checkin"));
        assert!(spec.paths.paths.contains_key("/api/hall-pass/export"));
        assert!(spec.paths.paths.contains_key("/api/attendance/summary"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"hallpass API\""));
    }
}
