//! API error types and response handling.
//!
//! Every failure leaves the server as `{"ok": false, "error", "code"}` with a
//! status code chosen from the core error's kind.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hallpass_core::{map_result, Envelope, ErrorKind, Failure, HallPassError, IntoEnvelope, Success};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - Pass, student or record does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - An open pass already exists, or the pass is closed.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - Storage or configuration failure.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "ok": false,
    "error": "Student s12345 already has an active hall pass in class P3",
    "code": "ACTIVE_PASS_EXISTS"
}))]
pub struct ErrorResponse {
    /// Always `false`.
    #[schema(example = false)]
    pub ok: bool,

    /// Human-readable error message.
    #[schema(example = "Student s12345 already has an active hall pass in class P3")]
    pub error: String,

    /// Machine-readable error code.
    #[schema(example = "ACTIVE_PASS_EXISTS")]
    pub code: String,
}

impl ApiError {
    /// Shorthand for a 400 with the given code.
    pub fn bad_request(error_code: &str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            error_code: error_code.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status code of this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (Self::BadRequest { error_code, message }
        | Self::NotFound { error_code, message }
        | Self::Conflict { error_code, message }
        | Self::InternalError { error_code, message }) = self;

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error_code = %error_code, message = %message, "Internal server error");
        }

        let body = ErrorResponse {
            ok: false,
            error: message,
            code: error_code,
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from a mapped core failure.
impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        let error_code = failure.code.to_string();
        let message = failure.error;
        match failure.kind {
            ErrorKind::Validation => Self::BadRequest { error_code, message },
            ErrorKind::NotFound => Self::NotFound { error_code, message },
            ErrorKind::Conflict | ErrorKind::AlreadyClosed => Self::Conflict { error_code, message },
            ErrorKind::Config | ErrorKind::Storage => Self::InternalError { error_code, message },
        }
    }
}

/// Convert from hallpass_core errors.
impl From<HallPassError> for ApiError {
    fn from(err: HallPassError) -> Self {
        Self::from(Failure::from(&err))
    }
}

/// Malformed or missing JSON body.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("INVALID_BODY", rejection.body_text())
    }
}

/// Missing or mistyped query parameter.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("INVALID_QUERY", rejection.body_text())
    }
}

/// Path segment that does not parse, e.g. a non-numeric pass id.
impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request("INVALID_PATH", rejection.body_text())
    }
}

/// Run a core result through the envelope mapper, keeping the success side.
///
/// # Errors
///
/// Returns the failure side as an [`ApiError`].
pub fn into_success<T: IntoEnvelope>(result: hallpass_core::Result<T>) -> ApiResult<Success<T::Record>> {
    match map_result(result) {
        Envelope::Success(success) => Ok(success),
        Envelope::Failure(failure) => Err(failure.into()),
    }
}
