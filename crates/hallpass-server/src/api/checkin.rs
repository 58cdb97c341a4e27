//! Daily attendance endpoints.
//!
//! Students check in from the kiosk with their s-number and a camera
//! snapshot. Only the first check-in of a local day is recorded; repeats
//! answer `already` without touching the stored record.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use hallpass_core::{first_name, AttendanceRecord, Student};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{into_success, ApiError, ApiResult, ErrorResponse};
use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::resolve_class;
use crate::state::{run_blocking, SharedState};

/// Routes mounted at the server root.
pub fn router() -> Router<SharedState> {
    Router::new().route("/checkin", post(check_in))
}

/// Routes mounted under `/api`.
pub fn api_router() -> Router<SharedState> {
    Router::new().route("/attendance", get(get_attendance))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a daily check-in.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "s_number": "s12345",
    "image_data_url": "data:image/png;base64,iVBORw0KGgo...",
    "classId": "P3"
}))]
pub struct CheckInRequest {
    /// Student number.
    #[serde(default)]
    #[schema(example = "s12345")]
    pub s_number: String,

    /// Camera snapshot as an image data URL.
    #[serde(default)]
    pub image_data_url: Option<String>,

    /// Class being attended; falls back to the default class.
    #[serde(default, rename = "classId", alias = "class_id")]
    #[schema(example = "P3")]
    pub class_id: Option<String>,
}

/// Response after a check-in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "ok": true,
    "status": "new",
    "first_name": "Alex"
}))]
pub struct CheckInResponse {
    /// Always `true`.
    pub ok: bool,

    /// `new` on the first check-in of the day, `already` afterwards.
    #[schema(example = "new")]
    pub status: String,

    /// First name for the kiosk greeting.
    #[schema(example = "Alex")]
    pub first_name: String,
}

/// Query parameters for the attendance listing.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Class to list; falls back to the default class.
    #[serde(rename = "classId")]
    #[param(example = "P3")]
    pub class_id: Option<String>,

    /// Local calendar day (YYYY-MM-DD). Defaults to today.
    #[param(example = "2025-10-28")]
    pub date: Option<String>,
}

/// Attendance for one class and day.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceResponse {
    /// Class listed.
    #[schema(example = "P3")]
    pub class_id: String,

    /// Day listed (YYYY-MM-DD).
    #[schema(example = "2025-10-28")]
    pub date: String,

    /// Students who checked in, in check-in order.
    pub present: Vec<AttendanceRecord>,

    /// Roster students with no check-in that day, by name.
    pub absent: Vec<Student>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Check a student in for today.
#[utoipa::path(
    post,
    path = "/checkin",
    tag = "attendance",
    operation_id = "checkIn",
    summary = "Check in for today",
    description = "Records the student's first check-in of the local day together with \
        the photo. Repeat check-ins return `already` and keep the first record.",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in", body = CheckInResponse),
        (status = 400, description = "Missing s-number or invalid photo", body = ErrorResponse),
        (status = 404, description = "S-number not on the class roster", body = ErrorResponse)
    )
)]
pub async fn check_in(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<CheckInRequest>,
) -> ApiResult<Json<CheckInResponse>> {
    let s_number = request.s_number.trim().to_string();
    if s_number.is_empty() {
        return Err(ApiError::bad_request("MISSING_FIELD", "Missing s-number"));
    }
    let photo = request
        .image_data_url
        .filter(|p| p.starts_with("data:image/"))
        .ok_or_else(|| ApiError::bad_request("INVALID_PHOTO", "Missing or invalid photo"))?;

    let class = resolve_class(&state, request.class_id.as_deref())?;
    let student = class.require_student(&s_number)?.clone();
    let class_id = class.id.clone();

    let result = run_blocking(&state, move |s| {
        s.attendance
            .check_in(&class_id, &student.s_number, &student.name, &photo)
    })
    .await;
    let success = into_success(result)?;

    Ok(Json(CheckInResponse {
        ok: true,
        status: success.status.to_string(),
        first_name: first_name(&success.record.name).to_string(),
    }))
}

/// List attendance for a class and day.
#[utoipa::path(
    get,
    path = "/api/attendance",
    tag = "attendance",
    operation_id = "getAttendance",
    summary = "List attendance for a day",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance listed", body = AttendanceResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse)
    )
)]
pub async fn get_attendance(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<AttendanceQuery>,
) -> ApiResult<Json<AttendanceResponse>> {
    let class = resolve_class(&state, query.class_id.as_deref())?.clone();
    let day = match query.date.as_deref() {
        Some(date) => parse_date(date)?,
        None => state.attendance.today(),
    };

    let class_id = class.id.clone();
    let present = run_blocking(&state, move |s| s.attendance.records_for_day(&class_id, day)).await?;

    let mut absent: Vec<Student> = class
        .students
        .iter()
        .filter(|st| !present.iter().any(|r| r.s_number == st.s_number.trim()))
        .cloned()
        .collect();
    absent.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(AttendanceResponse {
        class_id: class.id,
        date: day.format("%Y-%m-%d").to_string(),
        present,
        absent,
    }))
}

/// Parse a `YYYY-MM-DD` query value.
pub(crate) fn parse_date(date: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::bad_request("INVALID_FIELD", "Date must be in YYYY-MM-DD format (e.g., 2025-10-28)")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_in_request_accepts_both_class_keys() {
        let camel: CheckInRequest =
            serde_json::from_str(r#"{"s_number": "s1", "classId": "P3"}"#).unwrap();
        assert_eq!(camel.class_id.as_deref(), Some("P3"));
        let snake: CheckInRequest =
            serde_json::from_str(r#"{"s_number": "s1", "class_id": "P4"}"#).unwrap();
        assert_eq!(snake.class_id.as_deref(), Some("P4"));
        assert!(snake.image_data_url.is_none());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-10-28").unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 28).unwrap()
        );
        assert!(parse_date("10/28/2025").is_err());
    }
}
