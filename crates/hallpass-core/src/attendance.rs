//! Daily attendance.
//!
//! A student checks into a class at most once per local calendar day. Repeat
//! check-ins return the first record unchanged, so the front end can retry
//! freely.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::clock::{local_date, Clock};
use crate::config::ClassConfig;
use crate::error::{HallPassError, Result};
use crate::photos::{decode_data_url, PhotoStore};
use crate::reports::{attendance_csv, summarize_attendance, AttendanceSummary};
use crate::repository::AttendanceRepository;
use crate::types::{AttendanceRecord, CheckInStatus, Inserted, NewAttendance};

/// Result of [`AttendanceBook::check_in`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInOutcome {
    /// `new` if this call created the record.
    pub status: CheckInStatus,
    /// The day's record for the student.
    pub record: AttendanceRecord,
}

/// Records daily check-ins.
#[derive(Clone)]
pub struct AttendanceBook {
    repo: Arc<dyn AttendanceRepository>,
    clock: Arc<dyn Clock>,
    photos: PhotoStore,
    timezone: Tz,
}

impl AttendanceBook {
    /// Create a new attendance book.
    pub fn new(
        repo: Arc<dyn AttendanceRepository>,
        clock: Arc<dyn Clock>,
        photos: PhotoStore,
        timezone: Tz,
    ) -> Self {
        Self {
            repo,
            clock,
            photos,
            timezone,
        }
    }

    /// Today's date in the configured timezone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        local_date(self.timezone, self.clock.now())
    }

    /// Check a student into a class for today.
    ///
    /// The photo is validated on every call but only written when a new
    /// record is created.
    ///
    /// # Errors
    ///
    /// - [`HallPassError::MissingField`] for blank ids or name
    /// - [`HallPassError::InvalidPhoto`] if `photo` is not an image data URL
    pub fn check_in(
        &self,
        class_id: &str,
        s_number: &str,
        name: &str,
        photo: &str,
    ) -> Result<CheckInOutcome> {
        let class_id = class_id.trim();
        let s_number = s_number.trim();
        if class_id.is_empty() {
            return Err(HallPassError::MissingField("classId"));
        }
        if s_number.is_empty() {
            return Err(HallPassError::MissingField("s_number"));
        }
        if name.trim().is_empty() {
            return Err(HallPassError::MissingField("name"));
        }
        let image = decode_data_url(photo.trim())?;

        let now = self.clock.now();
        let day = local_date(self.timezone, now);

        if let Some(record) = self.repo.find(class_id, s_number, day)? {
            info!(class_id, s_number, %day, "Already checked in");
            return Ok(CheckInOutcome {
                status: CheckInStatus::Already,
                record,
            });
        }

        let folder = day.format("%Y-%m-%d").to_string();
        let reference = self
            .photos
            .write(&folder, &format!("{class_id}_{s_number}"), &image)?;

        let new = NewAttendance {
            class_id: class_id.to_string(),
            s_number: s_number.to_string(),
            name: name.trim().to_string(),
            day,
            checked_in_at: now,
            photo: reference.clone(),
        };

        match self.repo.insert_if_absent(new) {
            Ok(Inserted::Created(record)) => {
                info!(record_id = record.id, class_id, s_number, %day, "Checked in");
                Ok(CheckInOutcome {
                    status: CheckInStatus::New,
                    record,
                })
            }
            Ok(Inserted::Existing(record)) => {
                self.photos.remove(&reference);
                warn!(class_id, s_number, %day, "Concurrent check-in; keeping first record");
                Ok(CheckInOutcome {
                    status: CheckInStatus::Already,
                    record,
                })
            }
            Err(e) => {
                self.photos.remove(&reference);
                Err(e)
            }
        }
    }

    /// Records for a class on a day, in check-in order.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn records_for_day(&self, class_id: &str, day: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        self.repo.list_for_day(class_id.trim(), day)
    }

    /// Per-student attendance rates over every recorded day of a class.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn summary(&self, class: &ClassConfig) -> Result<AttendanceSummary> {
        let records = self.repo.list_all_for_class(&class.id)?;
        Ok(summarize_attendance(class, &records))
    }

    /// The day's attendance sheet as CSV, absentees first.
    ///
    /// # Errors
    ///
    /// Returns storage or export errors.
    pub fn export_day(&self, class: &ClassConfig, day: NaiveDate) -> Result<Vec<u8>> {
        let records = self.repo.list_for_day(&class.id, day)?;
        attendance_csv(class, &records, self.timezone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::MemoryStore;
    use crate::roster::Student;
    use chrono::{TimeZone, Utc};

    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn book() -> (tempfile::TempDir, Arc<ManualClock>, AttendanceBook) {
        let dir = tempfile::tempdir().unwrap();
        // 09:00 in Chicago.
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 10, 28, 14, 0, 0).unwrap(),
        ));
        let book = AttendanceBook::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            PhotoStore::new(dir.path()),
            chrono_tz::America::Chicago,
        );
        (dir, clock, book)
    }

    #[test]
    fn test_check_in_is_idempotent() {
        let (dir, clock, book) = book();
        let first = book.check_in("P3", "s12345", "Alex Rivera", PNG).unwrap();
        assert_eq!(first.status, CheckInStatus::New);
        assert_eq!(first.record.day, NaiveDate::from_ymd_opt(2025, 10, 28).unwrap());
        assert!(first.record.photo.starts_with("2025-10-28/P3_s12345_"));

        clock.advance_minutes(30);
        let second = book.check_in("P3", " s12345 ", "Alex Rivera", PNG).unwrap();
        assert_eq!(second.status, CheckInStatus::Already);
        assert_eq!(second.record, first.record);

        let files = std::fs::read_dir(dir.path().join("2025-10-28")).unwrap().count();
        assert_eq!(files, 1);
        assert_eq!(book.records_for_day("P3", book.today()).unwrap().len(), 1);
    }

    #[test]
    fn test_new_local_day_creates_new_record() {
        let (_dir, clock, book) = book();
        book.check_in("P3", "s1", "Alex", PNG).unwrap();

        // 23:30 local, still the same day.
        clock.set(Utc.with_ymd_and_hms(2025, 10, 29, 4, 30, 0).unwrap());
        assert_eq!(
            book.check_in("P3", "s1", "Alex", PNG).unwrap().status,
            CheckInStatus::Already
        );

        clock.advance_minutes(60);
        let next = book.check_in("P3", "s1", "Alex", PNG).unwrap();
        assert_eq!(next.status, CheckInStatus::New);
        assert_eq!(next.record.day, NaiveDate::from_ymd_opt(2025, 10, 29).unwrap());
    }

    #[test]
    fn test_classes_are_independent() {
        let (_dir, _clock, book) = book();
        book.check_in("P3", "s1", "Alex", PNG).unwrap();
        let other = book.check_in("P4", "s1", "Alex", PNG).unwrap();
        assert_eq!(other.status, CheckInStatus::New);
    }

    #[test]
    fn test_invalid_photo_is_rejected_even_when_checked_in() {
        let (_dir, _clock, book) = book();
        book.check_in("P3", "s1", "Alex", PNG).unwrap();
        let err = book.check_in("P3", "s1", "Alex", "hello").unwrap_err();
        assert!(matches!(err, HallPassError::InvalidPhoto(_)));
        assert!(matches!(
            book.check_in("P3", "", "Alex", PNG),
            Err(HallPassError::MissingField("s_number"))
        ));
    }

    fn period_three() -> ClassConfig {
        ClassConfig {
            id: "P3".into(),
            name: "Period 3".into(),
            students: vec![
                Student { s_number: "s1".into(), name: "Alex Rivera".into() },
                Student { s_number: "s2".into(), name: "Mia Chen".into() },
            ],
        }
    }

    #[test]
    fn test_summary_spans_recorded_days() {
        let (_dir, clock, book) = book();
        book.check_in("P3", "s1", "Alex Rivera", PNG).unwrap();
        book.check_in("P3", "s2", "Mia Chen", PNG).unwrap();
        book.check_in("P4", "s2", "Mia Chen", PNG).unwrap();
        clock.advance_minutes(24 * 60);
        book.check_in("P3", "s1", "Alex Rivera", PNG).unwrap();

        let summary = book.summary(&period_three()).unwrap();
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(summary.students[0].present_count, 2);
        assert_eq!(summary.students[1].present_count, 1);
        assert_eq!(summary.students[1].absent_count, 1);
        assert!((summary.avg_attendance - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_export_day_marks_absentees() {
        let (_dir, _clock, book) = book();
        book.check_in("P3", "s2", "Mia Chen", PNG).unwrap();

        let csv = String::from_utf8(book.export_day(&period_three(), book.today()).unwrap()).unwrap();
        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], "s1,Alex Rivera,,No,");
        assert!(rows[2].starts_with("s2,Mia Chen,2025-10-28 09:00:00,Yes,2025-10-28/P3_s2_"));
    }
}
