//! Stable response envelope for state machine results.
//!
//! Success is `{"ok": true, "status": ..., "record": ...}`; failure is
//! `{"ok": false, "error": ..., "code": ...}`. The [`ErrorKind`] travels with a
//! failure but is not serialized; transports read it through
//! [`Envelope::http_status`].

use serde::Serialize;
use utoipa::ToSchema;

use crate::attendance::CheckInOutcome;
use crate::error::{ErrorKind, HallPassError, Result};
use crate::types::{AttendanceRecord, CheckInStatus, Pass};

/// A successful outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Success<T> {
    /// Always `true`.
    pub ok: bool,
    /// Outcome label, e.g. `active`, `completed`, `new`, `already`.
    pub status: &'static str,
    /// The affected record.
    pub record: T,
}

/// A failed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Failure {
    /// Always `false`.
    #[schema(example = false)]
    pub ok: bool,
    /// Human-readable message.
    #[schema(example = "Student s12345 already has an active hall pass in class P3")]
    pub error: String,
    /// Machine-readable code.
    #[schema(example = "ACTIVE_PASS_EXISTS")]
    pub code: &'static str,
    /// Failure category.
    #[serde(skip)]
    pub kind: ErrorKind,
}

impl From<&HallPassError> for Failure {
    fn from(err: &HallPassError) -> Self {
        Self {
            ok: false,
            error: err.to_string(),
            code: err.error_code(),
            kind: err.kind(),
        }
    }
}

impl Failure {
    /// Transport status code for this failure.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.kind.http_status_code()
    }
}

/// Either side of a mapped result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    /// The operation succeeded.
    Success(Success<T>),
    /// The operation failed.
    Failure(Failure),
}

impl<T> Envelope<T> {
    /// Transport status code: 200 on success, else per failure kind.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Failure(f) => f.http_status(),
        }
    }

    /// Whether this is a success.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Something the state machine returns that can be put in an envelope.
pub trait IntoEnvelope {
    /// The record carried on success.
    type Record;

    /// Split into a status label and the record.
    fn into_parts(self) -> (&'static str, Self::Record);
}

impl IntoEnvelope for Pass {
    type Record = Self;

    fn into_parts(self) -> (&'static str, Self) {
        (self.status.as_str(), self)
    }
}

impl IntoEnvelope for CheckInOutcome {
    type Record = AttendanceRecord;

    fn into_parts(self) -> (&'static str, AttendanceRecord) {
        let label = match self.status {
            CheckInStatus::New => "new",
            CheckInStatus::Already => "already",
        };
        (label, self.record)
    }
}

/// Map a state machine result into an [`Envelope`].
pub fn map_result<T: IntoEnvelope>(result: Result<T>) -> Envelope<T::Record> {
    match result {
        Ok(value) => {
            let (status, record) = value.into_parts();
            Envelope::Success(Success {
                ok: true,
                status,
                record,
            })
        }
        Err(err) => Envelope::Failure(Failure::from(&err)),
    }
}
