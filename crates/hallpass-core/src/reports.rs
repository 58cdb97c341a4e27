//! Teacher-facing reports.
//!
//! CSV exports of the hall pass log and a day's attendance sheet, plus the
//! per-student attendance summary over every recorded day of a class. Times
//! in exports are rendered in the school's local timezone.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use csv::Writer;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::ClassConfig;
use crate::error::Result;
use crate::types::{AttendanceRecord, Pass};

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Attendance counts for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StudentAttendance {
    /// Full display name.
    #[schema(example = "Alex Rivera")]
    pub name: String,
    /// Student number.
    #[schema(example = "s12345")]
    pub s_number: String,
    /// Days the student checked in.
    pub present_count: u32,
    /// Recorded days the student missed.
    pub absent_count: u32,
    /// `present_count` as a percentage of recorded days.
    #[schema(example = 87.5)]
    pub attendance_rate: f64,
}

/// Attendance summary for a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSummary {
    /// Class summarized.
    #[schema(example = "P3")]
    pub class_id: String,
    /// Distinct days with at least one check-in.
    pub total_sessions: u32,
    /// Students on the roster.
    pub total_students: u32,
    /// Mean of the per-student rates.
    pub avg_attendance: f64,
    /// Per-student counts, sorted by name.
    pub students: Vec<StudentAttendance>,
}

fn local_time(tz: Tz, instant: DateTime<Utc>) -> String {
    instant.with_timezone(&tz).format(LOCAL_TIME_FORMAT).to_string()
}

fn finish(writer: Writer<Vec<u8>>) -> Result<Vec<u8>> {
    Ok(writer.into_inner().map_err(csv::IntoInnerError::into_error)?)
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Render a pass log as CSV, one row per pass in the given order.
///
/// # Errors
///
/// Returns [`crate::HallPassError::Export`] if a row cannot be written.
pub fn pass_log_csv(passes: &[Pass], tz: Tz) -> Result<Vec<u8>> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record([
        "Student ID",
        "Name",
        "Check Out Time",
        "Check In Time",
        "Duration (min)",
        "Reason",
        "Notes",
        "Status",
    ])?;

    for pass in passes {
        wtr.write_record([
            pass.s_number.clone(),
            pass.name.clone(),
            local_time(tz, pass.check_out_time),
            pass.check_in_time
                .map_or_else(|| "Not returned".to_string(), |t| local_time(tz, t)),
            pass.actual_duration
                .map_or_else(|| "N/A".to_string(), |m| m.to_string()),
            pass.check_out_reason.clone().unwrap_or_default(),
            pass.check_in_notes.clone().unwrap_or_default(),
            pass.status.as_str().to_string(),
        ])?;
    }

    finish(wtr)
}

/// Render a class's attendance sheet for one day as CSV.
///
/// Every roster student gets a row. Absentees come first, then those present,
/// each group in roster order. Records for students not on the roster are
/// left out.
///
/// # Errors
///
/// Returns [`crate::HallPassError::Export`] if a row cannot be written.
pub fn attendance_csv(class: &ClassConfig, records: &[AttendanceRecord], tz: Tz) -> Result<Vec<u8>> {
    let by_student: HashMap<&str, &AttendanceRecord> = records
        .iter()
        .map(|r| (r.s_number.trim(), r))
        .collect();
    let (present, absent): (Vec<_>, Vec<_>) = class
        .students
        .iter()
        .map(|s| (s, by_student.get(s.s_number.trim()).copied()))
        .partition(|(_, record)| record.is_some());

    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(["S-Number", "Name", "Timestamp", "Present", "Photo"])?;
    for (student, record) in absent.into_iter().chain(present) {
        let (timestamp, marker, photo) = match record {
            Some(r) => (local_time(tz, r.checked_in_at), "Yes", r.photo.as_str()),
            None => (String::new(), "No", ""),
        };
        wtr.write_record([
            student.s_number.as_str(),
            student.name.as_str(),
            timestamp.as_str(),
            marker,
            photo,
        ])?;
    }

    finish(wtr)
}

/// Summarize attendance for a class over every day with a check-in.
///
/// A student's rate is present days over recorded days, as a percentage, or
/// 0 when nothing has been recorded yet.
#[must_use]
pub fn summarize_attendance(class: &ClassConfig, records: &[AttendanceRecord]) -> AttendanceSummary {
    let sessions: BTreeSet<_> = records.iter().map(|r| r.day).collect();
    let total_sessions = count(sessions.len());

    let mut present: HashMap<&str, BTreeSet<_>> = HashMap::new();
    for record in records {
        present
            .entry(record.s_number.trim())
            .or_default()
            .insert(record.day);
    }

    let mut students: Vec<StudentAttendance> = class
        .students
        .iter()
        .map(|student| {
            let present_count = present
                .get(student.s_number.trim())
                .map_or(0, |days| count(days.len()));
            let attendance_rate = if total_sessions == 0 {
                0.0
            } else {
                f64::from(present_count) / f64::from(total_sessions) * 100.0
            };
            StudentAttendance {
                name: student.name.clone(),
                s_number: student.s_number.clone(),
                present_count,
                absent_count: total_sessions.saturating_sub(present_count),
                attendance_rate,
            }
        })
        .collect();
    students.sort_by(|a, b| a.name.cmp(&b.name));

    let total_students = count(students.len());
    let avg_attendance = if total_students == 0 {
        0.0
    } else {
        students.iter().map(|s| s.attendance_rate).sum::<f64>() / f64::from(total_students)
    };

    AttendanceSummary {
        class_id: class.id.clone(),
        total_sessions,
        total_students,
        avg_attendance,
        students,
    }
}
