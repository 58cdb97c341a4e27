//! Teacher reports: CSV downloads, the attendance summary and the roster.
//!
//! All of these are read-only. Exports are rendered in core and handed back
//! as `text/csv` attachments.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use hallpass_core::{AttendanceSummary, Student};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::checkin::{parse_date, AttendanceQuery};
use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ApiQuery;
use crate::api::passes::PassHistoryQuery;
use crate::api::resolve_class;
use crate::state::{run_blocking, SharedState};

/// Routes mounted under `/api`.
pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/attendance/export", get(export_attendance))
        .route("/attendance/summary", get(get_attendance_summary))
        .route("/roster", get(get_roster))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query naming only a class.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClassQuery {
    /// Class to report on; falls back to the default class.
    #[serde(default, rename = "classId")]
    #[param(example = "P3")]
    pub class_id: Option<String>,
}

/// A class roster.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "class_id": "P3",
    "name": "Period 3 Biology",
    "students": [{ "s_number": "s12345", "name": "Alex Rivera" }]
}))]
pub struct RosterResponse {
    /// Class listed.
    pub class_id: String,

    /// Class display name.
    pub name: String,

    /// Enrolled students in roster order.
    pub students: Vec<Student>,
}

fn csv_attachment(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// Download the hall pass log as CSV.
#[utoipa::path(
    get,
    path = "/api/hall-pass/export",
    tag = "reports",
    operation_id = "exportPasses",
    summary = "Export the hall pass log",
    description = "The class's passes as CSV, newest checkout first, optionally limited \
        to one local calendar day. Open passes show `Not returned` and `N/A`.",
    params(PassHistoryQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
        (status = 400, description = "Invalid date", body = ErrorResponse)
    )
)]
pub async fn export_passes(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<PassHistoryQuery>,
) -> ApiResult<Response> {
    let class_id = resolve_class(&state, query.class_id.as_deref())?.id.clone();
    let day = query.date.as_deref().map(parse_date).transpose()?;
    let filename = format!(
        "hall_passes_{class_id}_{}.csv",
        day.map_or_else(|| "all".to_string(), |d| d.format("%Y-%m-%d").to_string())
    );
    let body = run_blocking(&state, move |s| s.passes.export_log(&class_id, day)).await?;
    Ok(csv_attachment(&filename, body))
}

/// Download a day's attendance sheet as CSV.
#[utoipa::path(
    get,
    path = "/api/attendance/export",
    tag = "reports",
    operation_id = "exportAttendance",
    summary = "Export attendance for a day",
    description = "One row per roster student with absentees listed first. Defaults to today.",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
        (status = 400, description = "Invalid date", body = ErrorResponse)
    )
)]
pub async fn export_attendance(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<AttendanceQuery>,
) -> ApiResult<Response> {
    let class = resolve_class(&state, query.class_id.as_deref())?.clone();
    let day = match query.date.as_deref() {
        Some(date) => parse_date(date)?,
        None => state.attendance.today(),
    };
    let filename = format!("attendance_{}_{}.csv", class.id, day.format("%Y-%m-%d"));
    let body = run_blocking(&state, move |s| s.attendance.export_day(&class, day)).await?;
    Ok(csv_attachment(&filename, body))
}

/// Attendance rates per student.
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    tag = "reports",
    operation_id = "getAttendanceSummary",
    summary = "Summarize attendance",
    description = "Present and absent counts for every roster student over the days \
        with at least one check-in, sorted by name.",
    params(ClassQuery),
    responses(
        (status = 200, description = "Summary", body = AttendanceSummary),
        (status = 400, description = "No class configured", body = ErrorResponse)
    )
)]
pub async fn get_attendance_summary(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ClassQuery>,
) -> ApiResult<Json<AttendanceSummary>> {
    let class = resolve_class(&state, query.class_id.as_deref())?.clone();
    let summary = run_blocking(&state, move |s| s.attendance.summary(&class)).await?;
    Ok(Json(summary))
}

/// A class roster.
#[utoipa::path(
    get,
    path = "/api/roster",
    tag = "reports",
    operation_id = "getRoster",
    summary = "Get a class roster",
    params(ClassQuery),
    responses(
        (status = 200, description = "Roster", body = RosterResponse),
        (status = 400, description = "No class configured", body = ErrorResponse)
    )
)]
pub async fn get_roster(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ClassQuery>,
) -> ApiResult<Json<RosterResponse>> {
    let class = resolve_class(&state, query.class_id.as_deref())?;
    Ok(Json(RosterResponse {
        class_id: class.id.clone(),
        name: class.name.clone(),
        students: class.students.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_attachment_headers() {
        let response = csv_attachment("attendance_P3_2025-10-28.csv", b"a,b\n".to_vec());
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"attendance_P3_2025-10-28.csv\""
        );
    }
}
