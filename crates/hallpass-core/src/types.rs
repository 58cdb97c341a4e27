//! Shared domain types and OpenAPI schemas.
//!
//! These are the records the state machine produces and the repositories
//! persist. Field names serialize in `snake_case` to match the stored columns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::HallPassError;

/// Lifecycle state of a hall pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    /// Student is out and within the expected duration (or none was set).
    Active,
    /// Student is out longer than the expected duration.
    Overdue,
    /// Student is back. Terminal.
    Completed,
}

impl PassStatus {
    /// Column value used by the SQLite store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Overdue => "overdue",
            Self::Completed => "completed",
        }
    }

    /// `true` for `active` and `overdue`.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Overdue)
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassStatus {
    type Err = HallPassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "overdue" => Ok(Self::Overdue),
            "completed" => Ok(Self::Completed),
            other => Err(HallPassError::Storage(format!(
                "unknown pass status in store: {other}"
            ))),
        }
    }
}

/// One checkout event, from leaving the room to coming back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 42,
    "class_id": "P3",
    "s_number": "s12345",
    "name": "Alex Rivera",
    "check_out_time": "2025-10-28T15:04:00Z",
    "check_in_time": null,
    "expected_duration": 10,
    "actual_duration": null,
    "check_out_photo": "hall_pass/0192f7d4.png",
    "check_in_photo": null,
    "check_out_reason": "Restroom",
    "check_in_notes": null,
    "status": "active"
}))]
pub struct Pass {
    /// Store-assigned identifier.
    pub id: i64,
    /// Class the pass was issued in.
    pub class_id: String,
    /// Student s-number.
    pub s_number: String,
    /// Student display name at checkout time.
    pub name: String,
    /// When the student left.
    pub check_out_time: DateTime<Utc>,
    /// When the student came back; present exactly when completed.
    pub check_in_time: Option<DateTime<Utc>>,
    /// Allowed minutes before the pass turns overdue.
    pub expected_duration: Option<u32>,
    /// Whole minutes spent out, set on check-in.
    pub actual_duration: Option<u32>,
    /// Reference to the checkout photo.
    pub check_out_photo: Option<String>,
    /// Reference to the check-in photo.
    pub check_in_photo: Option<String>,
    /// Why the student left.
    pub check_out_reason: Option<String>,
    /// Notes recorded on return.
    pub check_in_notes: Option<String>,
    /// Current lifecycle state.
    pub status: PassStatus,
}

/// Fields of a pass about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct NewPass {
    pub class_id: String,
    pub s_number: String,
    pub name: String,
    pub check_out_time: DateTime<Utc>,
    pub expected_duration: Option<u32>,
    pub check_out_photo: Option<String>,
    pub check_out_reason: Option<String>,
}

impl NewPass {
    /// The stored row this insert produces once the store assigns `id`.
    #[must_use]
    pub fn into_pass(self, id: i64) -> Pass {
        Pass {
            id,
            class_id: self.class_id,
            s_number: self.s_number,
            name: self.name,
            check_out_time: self.check_out_time,
            check_in_time: None,
            expected_duration: self.expected_duration,
            actual_duration: None,
            check_out_photo: self.check_out_photo,
            check_in_photo: None,
            check_out_reason: self.check_out_reason,
            check_in_notes: None,
            status: PassStatus::Active,
        }
    }
}

/// The closing write applied to an open pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassClosure {
    /// When the student returned.
    pub check_in_time: DateTime<Utc>,
    /// Whole minutes out, see [`crate::passes::elapsed_minutes`].
    pub actual_duration: u32,
    /// Reference to the check-in photo.
    pub check_in_photo: Option<String>,
    /// Free-text notes.
    pub check_in_notes: Option<String>,
}

/// A student's presence in one class on one local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "class_id": "P3",
    "s_number": "s12345",
    "name": "Alex Rivera",
    "day": "2025-10-28",
    "checked_in_at": "2025-10-28T14:01:22Z",
    "photo": "2025-10-28/P3_s12345_0192f7d4.png"
}))]
pub struct AttendanceRecord {
    /// Store-assigned identifier.
    pub id: i64,
    /// Class checked into.
    pub class_id: String,
    /// Student s-number.
    pub s_number: String,
    /// Student display name.
    pub name: String,
    /// Local calendar day the record counts for.
    #[schema(value_type = String, format = Date)]
    pub day: NaiveDate,
    /// First check-in of the day.
    pub checked_in_at: DateTime<Utc>,
    /// Reference to the check-in photo.
    pub photo: String,
}

/// Fields of an attendance record about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct NewAttendance {
    pub class_id: String,
    pub s_number: String,
    pub name: String,
    pub day: NaiveDate,
    pub checked_in_at: DateTime<Utc>,
    pub photo: String,
}

impl NewAttendance {
    /// The stored record once the store assigns `id`.
    #[must_use]
    pub fn into_record(self, id: i64) -> AttendanceRecord {
        AttendanceRecord {
            id,
            class_id: self.class_id,
            s_number: self.s_number,
            name: self.name,
            day: self.day,
            checked_in_at: self.checked_in_at,
            photo: self.photo,
        }
    }
}

/// Whether a check-in created a record or found the day's existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckInStatus {
    /// First check-in today.
    New,
    /// Already checked in today; nothing was written.
    Already,
}

/// Outcome of an insert-if-absent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inserted<T> {
    /// The row was written.
    Created(T),
    /// A matching row was already there; nothing was written.
    Existing(T),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_column_value() {
        for status in [PassStatus::Active, PassStatus::Overdue, PassStatus::Completed] {
            assert_eq!(status.as_str().parse::<PassStatus>().unwrap(), status);
        }
        assert!("paused".parse::<PassStatus>().is_err());
    }

    #[test]
    fn test_open_statuses() {
        assert!(PassStatus::Active.is_open());
        assert!(PassStatus::Overdue.is_open());
        assert!(!PassStatus::Completed.is_open());
    }

    #[test]
    fn test_pass_serializes_lowercase_status() {
        let pass = NewPass {
            class_id: "P3".into(),
            s_number: "s1".into(),
            name: "Alex".into(),
            check_out_time: DateTime::<Utc>::UNIX_EPOCH,
            expected_duration: Some(10),
            check_out_photo: None,
            check_out_reason: None,
        }
        .into_pass(1);
        let json = serde_json::to_value(&pass).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["check_in_time"], serde_json::Value::Null);
    }
}
