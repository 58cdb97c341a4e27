//! Hall pass API endpoints.
//!
//! A student leaving the room checks out a pass, optionally with a photo,
//! a reason and an expected duration. The pass turns `overdue` once that
//! duration is exceeded and is closed when the student checks back in.
//! Only one open pass per student and class may exist at a time.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use hallpass_core::{IssuePass, Pass, ReturnDetails, Success};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::checkin::parse_date;
use crate::api::error::{into_success, ApiError, ApiResult, ErrorResponse};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::reports::export_passes;
use crate::api::resolve_class;
use crate::state::{run_blocking, SharedState};

/// Creates the hall pass router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/checkin", post(checkin))
        .route("/active", get(get_active_pass))
        .route("/status/{class_id}", get(get_status))
        .route("/history", get(get_history))
        .route("/export", get(export_passes))
        .route("/{id}", get(get_pass))
        .route("/{id}/checkin", post(checkin_by_id))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for checking out a hall pass.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[schema(example = json!({
    "s_number": "s12345",
    "classId": "P3",
    "expected_duration": 10,
    "reason": "Restroom"
}))]
pub struct CheckoutRequest {
    /// Student number.
    #[serde(default)]
    #[schema(example = "s12345")]
    pub s_number: String,

    /// Class the student is leaving; falls back to the default class.
    #[serde(default, rename = "classId", alias = "class_id")]
    #[schema(example = "P3")]
    pub class_id: Option<String>,

    /// Minutes before the pass turns overdue. Defaults to the configured value.
    #[serde(default, alias = "duration")]
    #[schema(example = 10, minimum = 1)]
    pub expected_duration: Option<u32>,

    /// Checkout photo as an image data URL.
    #[serde(default, alias = "image_data_url")]
    pub photo: Option<String>,

    /// Why the student is leaving. Maximum 500 characters.
    #[serde(default)]
    #[schema(example = "Restroom", max_length = 500)]
    pub reason: Option<String>,
}

/// Request body for checking a student back in.
///
/// Identify the pass either by `pass_id` or by `s_number` and `classId`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[schema(example = json!({
    "s_number": "s12345",
    "classId": "P3",
    "notes": "Back from the nurse"
}))]
pub struct CheckinRequest {
    /// Student number.
    #[serde(default)]
    #[schema(example = "s12345")]
    pub s_number: Option<String>,

    /// Class of the open pass; falls back to the default class.
    #[serde(default, rename = "classId", alias = "class_id")]
    #[schema(example = "P3")]
    pub class_id: Option<String>,

    /// Close this pass instead of looking one up by student.
    #[serde(default)]
    pub pass_id: Option<i64>,

    /// Check-in photo as an image data URL.
    #[serde(default, alias = "image_data_url")]
    pub photo: Option<String>,

    /// Free-text notes. Maximum 500 characters.
    #[serde(default)]
    #[schema(example = "Back from the nurse", max_length = 500)]
    pub notes: Option<String>,
}

/// Request body for checking in a pass by id.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckinByIdRequest {
    /// Check-in photo as an image data URL.
    #[serde(default, alias = "image_data_url")]
    pub photo: Option<String>,

    /// Free-text notes. Maximum 500 characters.
    #[serde(default)]
    pub notes: Option<String>,
}

/// A single pass with its status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "ok": true,
    "status": "active",
    "pass": {
        "id": 42,
        "class_id": "P3",
        "s_number": "s12345",
        "name": "Alex Rivera",
        "check_out_time": "2025-10-28T15:04:05Z",
        "check_in_time": null,
        "expected_duration": 10,
        "actual_duration": null,
        "check_out_photo": null,
        "check_in_photo": null,
        "check_out_reason": "Restroom",
        "check_in_notes": null,
        "status": "active"
    }
}))]
pub struct PassResponse {
    /// Always `true`.
    pub ok: bool,

    /// Status of the pass: `active`, `overdue` or `completed`.
    #[schema(example = "active")]
    pub status: String,

    /// The pass.
    pub pass: Pass,
}

impl From<Success<Pass>> for PassResponse {
    fn from(success: Success<Pass>) -> Self {
        Self {
            ok: success.ok,
            status: success.status.to_string(),
            pass: success.record,
        }
    }
}

/// Query parameters identifying a student in a class.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivePassQuery {
    /// Class; falls back to the default class.
    #[serde(default, rename = "classId")]
    #[param(example = "P3")]
    pub class_id: Option<String>,

    /// Student number.
    #[param(example = "s12345")]
    pub s_number: String,
}

/// Query parameters for pass history.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PassHistoryQuery {
    /// Class to list; falls back to the default class.
    #[serde(default, rename = "classId")]
    #[param(example = "P3")]
    pub class_id: Option<String>,

    /// Only passes checked out on this local day (YYYY-MM-DD).
    #[param(example = "2025-10-28")]
    pub date: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Check out a hall pass.
#[utoipa::path(
    post,
    path = "/api/hall-pass/checkout",
    tag = "hall-pass",
    operation_id = "checkoutPass",
    summary = "Check out a hall pass",
    description = "Issues an `active` pass to a student on the class roster. Fails with \
        409 while the student already has an active or overdue pass in the class.",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Pass issued", body = PassResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "S-number not on the class roster", body = ErrorResponse),
        (status = 409, description = "Student already has an open pass", body = ErrorResponse)
    )
)]
pub async fn checkout(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> ApiResult<Json<PassResponse>> {
    if request.s_number.trim().is_empty() {
        return Err(ApiError::bad_request("MISSING_FIELD", "Missing s-number"));
    }
    let class = resolve_class(&state, request.class_id.as_deref())?;
    let student = class.require_student(&request.s_number)?;

    let issue = IssuePass {
        class_id: class.id.clone(),
        s_number: student.s_number.clone(),
        name: student.name.clone(),
        expected_duration: request
            .expected_duration
            .or(state.config.passes.default_expected_minutes),
        photo: request.photo,
        reason: request.reason,
    };

    let result = run_blocking(&state, move |s| s.passes.issue_pass(issue)).await;
    Ok(Json(into_success(result)?.into()))
}

/// Check a student back in.
#[utoipa::path(
    post,
    path = "/api/hall-pass/checkin",
    tag = "hall-pass",
    operation_id = "checkinPass",
    summary = "Check in a hall pass",
    description = "Closes the student's open pass in the class (or the pass named by \
        `pass_id`) and records the whole minutes spent out.",
    request_body = CheckinRequest,
    responses(
        (status = 200, description = "Pass closed", body = PassResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "No open pass", body = ErrorResponse),
        (status = 409, description = "Pass already closed", body = ErrorResponse)
    )
)]
pub async fn checkin(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<CheckinRequest>,
) -> ApiResult<Json<PassResponse>> {
    let details = ReturnDetails {
        photo: request.photo,
        notes: request.notes,
    };

    let result = if let Some(id) = request.pass_id {
        run_blocking(&state, move |s| s.passes.close_pass_by_id(id, details)).await
    } else {
        let s_number = request
            .s_number
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("MISSING_FIELD", "Missing s-number or pass_id"))?;
        let class_id = resolve_class(&state, request.class_id.as_deref())?.id.clone();
        run_blocking(&state, move |s| s.passes.close_pass(&class_id, &s_number, details)).await
    };

    Ok(Json(into_success(result)?.into()))
}

/// Check in a hall pass by id.
#[utoipa::path(
    post,
    path = "/api/hall-pass/{id}/checkin",
    tag = "hall-pass",
    operation_id = "checkinPassById",
    summary = "Check in a hall pass by id",
    params(("id" = i64, Path, description = "Pass id")),
    request_body = CheckinByIdRequest,
    responses(
        (status = 200, description = "Pass closed", body = PassResponse),
        (status = 404, description = "Unknown pass", body = ErrorResponse),
        (status = 409, description = "Pass already closed", body = ErrorResponse)
    )
)]
pub async fn checkin_by_id(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    body: Bytes,
) -> ApiResult<Json<PassResponse>> {
    // The body is optional; an empty POST closes the pass with no extras.
    let request: CheckinByIdRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckinByIdRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request("INVALID_BODY", format!("Invalid JSON body: {e}")))?
    };
    let details = ReturnDetails {
        photo: request.photo,
        notes: request.notes,
    };

    let result = run_blocking(&state, move |s| s.passes.close_pass_by_id(id, details)).await;
    Ok(Json(into_success(result)?.into()))
}

/// Get a student's open pass.
#[utoipa::path(
    get,
    path = "/api/hall-pass/active",
    tag = "hall-pass",
    operation_id = "getActivePass",
    summary = "Get a student's open pass",
    description = "Returns the student's `active` or `overdue` pass in the class, with \
        overdue status applied as of now.",
    params(ActivePassQuery),
    responses(
        (status = 200, description = "Open pass", body = PassResponse),
        (status = 404, description = "No open pass", body = ErrorResponse)
    )
)]
pub async fn get_active_pass(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ActivePassQuery>,
) -> ApiResult<Json<PassResponse>> {
    let class_id = resolve_class(&state, query.class_id.as_deref())?.id.clone();
    let s_number = query.s_number.trim().to_string();

    let result = run_blocking(&state, move |s| {
        s.passes
            .get_active_pass(&class_id, &s_number)?
            .ok_or(hallpass_core::HallPassError::NoActivePass {
                class_id,
                student_id: s_number,
            })
    })
    .await;
    Ok(Json(into_success(result)?.into()))
}

/// List open passes for a class.
#[utoipa::path(
    get,
    path = "/api/hall-pass/status/{class_id}",
    tag = "hall-pass",
    operation_id = "getPassStatus",
    summary = "List open passes for a class",
    description = "Returns every `active` and `overdue` pass of the class, newest \
        checkout first. Overdue passes are marked before listing.",
    params(("class_id" = String, Path, description = "Class id")),
    responses(
        (status = 200, description = "Open passes", body = [Pass])
    )
)]
pub async fn get_status(
    State(state): State<SharedState>,
    ApiPath(class_id): ApiPath<String>,
) -> ApiResult<Json<Vec<Pass>>> {
    let class_id = resolve_class(&state, Some(&class_id))?.id.clone();
    let passes = run_blocking(&state, move |s| s.passes.open_passes(&class_id)).await?;
    Ok(Json(passes))
}

/// List pass history for a class.
#[utoipa::path(
    get,
    path = "/api/hall-pass/history",
    tag = "hall-pass",
    operation_id = "getPassHistory",
    summary = "List pass history",
    description = "Returns every pass of the class, newest checkout first, optionally \
        limited to one local calendar day.",
    params(PassHistoryQuery),
    responses(
        (status = 200, description = "Passes", body = [Pass]),
        (status = 400, description = "Invalid date", body = ErrorResponse)
    )
)]
pub async fn get_history(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<PassHistoryQuery>,
) -> ApiResult<Json<Vec<Pass>>> {
    let class_id = resolve_class(&state, query.class_id.as_deref())?.id.clone();
    let day = query.date.as_deref().map(parse_date).transpose()?;
    let passes = run_blocking(&state, move |s| s.passes.history(&class_id, day)).await?;
    Ok(Json(passes))
}

/// Get a pass by id.
#[utoipa::path(
    get,
    path = "/api/hall-pass/{id}",
    tag = "hall-pass",
    operation_id = "getPass",
    summary = "Get a hall pass",
    params(("id" = i64, Path, description = "Pass id")),
    responses(
        (status = 200, description = "The pass", body = PassResponse),
        (status = 404, description = "Unknown pass", body = ErrorResponse)
    )
)]
pub async fn get_pass(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<PassResponse>> {
    let result = run_blocking(&state, move |s| {
        s.passes
            .get_pass(id)?
            .ok_or(hallpass_core::HallPassError::PassNotFound(id))
    })
    .await;
    Ok(Json(into_success(result)?.into()))
}
