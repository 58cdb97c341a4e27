//! Hall pass lifecycle.
//!
//! A pass is issued when a student leaves the room (`active`), may turn
//! `overdue` once it has been out longer than its expected duration, and is
//! closed when the student returns (`completed`, terminal). [`derive_status`]
//! is the single rule for overdue; both the read paths here and the
//! [`crate::sweeper::Sweeper`] use it.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::clock::{local_day_window, Clock};
use crate::error::{HallPassError, Result};
use crate::photos::{decode_data_url, DecodedImage, PhotoStore};
use crate::reports::pass_log_csv;
use crate::repository::PassRepository;
use crate::types::{Inserted, NewPass, Pass, PassClosure, PassStatus};

/// Maximum length of a checkout reason or check-in note, in characters.
pub const MAX_REASON_LENGTH: usize = 500;

/// Folder below the photo root used for hall pass photos.
pub const PASS_PHOTO_FOLDER: &str = "hall_pass";

/// The status `pass` should have at `now`.
///
/// `completed` and `overdue` are returned unchanged; `active` becomes
/// `overdue` strictly after `expected_duration` minutes have elapsed.
#[must_use]
pub fn derive_status(pass: &Pass, now: DateTime<Utc>) -> PassStatus {
    match (pass.status, pass.expected_duration) {
        (PassStatus::Active, Some(minutes)) => {
            if now - pass.check_out_time > Duration::minutes(i64::from(minutes)) {
                PassStatus::Overdue
            } else {
                PassStatus::Active
            }
        }
        (status, _) => status,
    }
}

/// Whole minutes from `from` to `to`, rounded down, never negative.
#[must_use]
pub fn elapsed_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let minutes = (to - from).num_minutes().max(0);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Input for [`PassManager::issue_pass`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuePass {
    /// Class the student is leaving.
    pub class_id: String,
    /// Student s-number.
    pub s_number: String,
    /// Display name resolved from the roster.
    pub name: String,
    /// Minutes before the pass turns overdue.
    pub expected_duration: Option<u32>,
    /// Checkout photo as an image data URL.
    pub photo: Option<String>,
    /// Why the student is leaving.
    pub reason: Option<String>,
}

/// Optional extras recorded when a pass is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnDetails {
    /// Check-in photo as an image data URL.
    pub photo: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
}

/// Issues, closes and reads hall passes.
#[derive(Clone)]
pub struct PassManager {
    repo: Arc<dyn PassRepository>,
    clock: Arc<dyn Clock>,
    photos: PhotoStore,
    timezone: Tz,
}

fn required(value: &str, field: &'static str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(HallPassError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional_text(value: Option<String>, field: &'static str) -> Result<Option<String>> {
    let Some(text) = value.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let len = text.chars().count();
    if len > MAX_REASON_LENGTH {
        return Err(HallPassError::invalid(
            field,
            format!("exceeds maximum length of {MAX_REASON_LENGTH} characters (got {len})"),
        ));
    }
    Ok(Some(text))
}

fn decode_optional_photo(photo: Option<&str>) -> Result<Option<DecodedImage>> {
    photo
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(decode_data_url)
        .transpose()
}

impl PassManager {
    /// Create a new pass manager.
    pub fn new(
        repo: Arc<dyn PassRepository>,
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

    /// Issue a pass to a student leaving the room.
    ///
    /// # Errors
    ///
    /// - [`HallPassError::MissingField`] / [`HallPassError::InvalidField`] /
    ///   [`HallPassError::InvalidPhoto`] for bad input
    /// - [`HallPassError::ActivePassExists`] if the student already has an
    ///   `active` or `overdue` pass in the class
    pub fn issue_pass(&self, request: IssuePass) -> Result<Pass> {
        let class_id = required(&request.class_id, "classId")?;
        let s_number = required(&request.s_number, "s_number")?;
        let name = required(&request.name, "name")?;
        if request.expected_duration == Some(0) {
            return Err(HallPassError::invalid(
                "expected_duration",
                "must be a positive number of minutes",
            ));
        }
        let reason = optional_text(request.reason, "reason")?;
        let image = decode_optional_photo(request.photo.as_deref())?;

        // Cheap early rejection so no photo is written for a doomed request.
        if let Some(open) = self.repo.find_open(&class_id, &s_number)? {
            warn!(class_id = %class_id, s_number = %s_number, pass_id = open.id,
                "Rejected checkout: pass already open");
            return Err(HallPassError::ActivePassExists {
                class_id,
                student_id: s_number,
                pass_id: open.id,
            });
        }

        let photo = image
            .map(|img| {
                self.photos
                    .write(PASS_PHOTO_FOLDER, &format!("checkout_{s_number}"), &img)
            })
            .transpose()?;

        let new = NewPass {
            class_id: class_id.clone(),
            s_number: s_number.clone(),
            name,
            check_out_time: self.clock.now(),
            expected_duration: request.expected_duration,
            check_out_photo: photo.clone(),
            check_out_reason: reason,
        };

        match self.repo.insert_if_no_open(new) {
            Ok(Inserted::Created(pass)) => {
                info!(pass_id = pass.id, class_id = %pass.class_id, s_number = %pass.s_number,
                    expected_duration = ?pass.expected_duration, "Hall pass issued");
                Ok(pass)
            }
            Ok(Inserted::Existing(open)) => {
                self.discard_photo(photo.as_deref());
                warn!(class_id = %class_id, s_number = %s_number, pass_id = open.id,
                    "Rejected checkout: lost race with concurrent checkout");
                Err(HallPassError::ActivePassExists {
                    class_id,
                    student_id: s_number,
                    pass_id: open.id,
                })
            }
            Err(e) => {
                self.discard_photo(photo.as_deref());
                Err(e)
            }
        }
    }

    /// Close the student's open pass in a class.
    ///
    /// # Errors
    ///
    /// - [`HallPassError::NoActivePass`] if nothing is open
    /// - [`HallPassError::AlreadyClosed`] if another close won the race
    pub fn close_pass(
        &self,
        class_id: &str,
        s_number: &str,
        details: ReturnDetails,
    ) -> Result<Pass> {
        let class_id = required(class_id, "classId")?;
        let s_number = required(s_number, "s_number")?;
        let notes = optional_text(details.notes, "notes")?;
        let image = decode_optional_photo(details.photo.as_deref())?;

        let Some(open) = self.repo.find_open(&class_id, &s_number)? else {
            warn!(class_id = %class_id, s_number = %s_number, "Rejected check-in: no open pass");
            return Err(HallPassError::NoActivePass {
                class_id,
                student_id: s_number,
            });
        };

        self.finish(&open, image, notes)
    }

    /// Close a pass by id.
    ///
    /// # Errors
    ///
    /// - [`HallPassError::PassNotFound`] for unknown ids
    /// - [`HallPassError::AlreadyClosed`] if the pass is `completed`
    pub fn close_pass_by_id(&self, id: i64, details: ReturnDetails) -> Result<Pass> {
        let notes = optional_text(details.notes, "notes")?;
        let image = decode_optional_photo(details.photo.as_deref())?;

        let pass = self.repo.get(id)?.ok_or(HallPassError::PassNotFound(id))?;
        if pass.status == PassStatus::Completed {
            warn!(pass_id = id, "Rejected check-in: pass already closed");
            return Err(HallPassError::AlreadyClosed(id));
        }

        self.finish(&pass, image, notes)
    }

    fn finish(
        &self,
        open: &Pass,
        image: Option<DecodedImage>,
        notes: Option<String>,
    ) -> Result<Pass> {
        let photo = image
            .map(|img| {
                self.photos
                    .write(PASS_PHOTO_FOLDER, &format!("checkin_{}", open.s_number), &img)
            })
            .transpose()?;

        let now = self.clock.now();
        let closure = PassClosure {
            check_in_time: now,
            actual_duration: elapsed_minutes(open.check_out_time, now),
            check_in_photo: photo.clone(),
            check_in_notes: notes,
        };

        match self.repo.close(open.id, &closure) {
            Ok(Some(closed)) => {
                info!(pass_id = closed.id, class_id = %closed.class_id,
                    s_number = %closed.s_number, actual_duration = closure.actual_duration,
                    "Hall pass closed");
                Ok(closed)
            }
            Ok(None) => {
                self.discard_photo(photo.as_deref());
                warn!(pass_id = open.id, "Rejected check-in: pass closed concurrently");
                Err(HallPassError::AlreadyClosed(open.id))
            }
            Err(e) => {
                self.discard_photo(photo.as_deref());
                Err(e)
            }
        }
    }

    fn discard_photo(&self, photo: Option<&str>) {
        if let Some(reference) = photo {
            self.photos.remove(reference);
        }
    }

    /// Bring a stored pass up to date, persisting an `active → overdue` flip.
    fn refresh(&self, mut pass: Pass, now: DateTime<Utc>) -> Result<Pass> {
        if pass.status != PassStatus::Active || derive_status(&pass, now) != PassStatus::Overdue {
            return Ok(pass);
        }
        if self.repo.mark_overdue(pass.id)? {
            info!(pass_id = pass.id, "Hall pass overdue");
            pass.status = PassStatus::Overdue;
            return Ok(pass);
        }
        // Someone else moved it first (a sweep or a close); report the stored row.
        Ok(self.repo.get(pass.id)?.unwrap_or(pass))
    }

    /// Round trip to the pass store, for health checks.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the store cannot be reached.
    pub fn check_storage(&self) -> Result<()> {
        self.repo.ping()
    }

    /// The student's open pass in a class, with overdue applied.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn get_active_pass(&self, class_id: &str, s_number: &str) -> Result<Option<Pass>> {
        let now = self.clock.now();
        self.repo
            .find_open(class_id.trim(), s_number.trim())?
            .map(|pass| self.refresh(pass, now))
            .transpose()
    }

    /// A pass by id, with overdue applied.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn get_pass(&self, id: i64) -> Result<Option<Pass>> {
        let now = self.clock.now();
        self.repo
            .get(id)?
            .map(|pass| self.refresh(pass, now))
            .transpose()
    }

    /// Open passes of a class, newest first, with overdue applied.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn open_passes(&self, class_id: &str) -> Result<Vec<Pass>> {
        let now = self.clock.now();
        self.repo
            .list_open_for_class(class_id.trim())?
            .into_iter()
            .map(|pass| self.refresh(pass, now))
            .collect()
    }

    /// All passes of a class, newest first, optionally limited to checkouts
    /// on one local calendar day.
    ///
    /// Statuses are reported as derived at the current time; nothing is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn history(&self, class_id: &str, day: Option<NaiveDate>) -> Result<Vec<Pass>> {
        let now = self.clock.now();
        let window = day.map(|d| local_day_window(self.timezone, d));
        let mut passes = self.repo.list_for_class(class_id.trim(), window)?;
        for pass in &mut passes {
            pass.status = derive_status(pass, now);
        }
        Ok(passes)
    }

    /// The class's pass log as CSV, in [`PassManager::history`] order.
    ///
    /// # Errors
    ///
    /// Returns storage or export errors.
    pub fn export_log(&self, class_id: &str, day: Option<NaiveDate>) -> Result<Vec<u8>> {
        let passes = self.history(class_id, day)?;
        pass_log_csv(&passes, self.timezone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::MemoryStore;
    use crate::sweeper::Sweeper;
    use chrono::TimeZone;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        photos: PhotoStore,
        manager: PassManager,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 10, 28, 15, 0, 0).unwrap(),
        ));
        let photos = PhotoStore::new(dir.path());
        let manager = PassManager::new(
            store.clone(),
            clock.clone(),
            photos.clone(),
            chrono_tz::America::Chicago,
        );
        Fixture {
            _dir: dir,
            store,
            clock,
            photos,
            manager,
        }
    }

    fn issue(class_id: &str, s_number: &str, expected: Option<u32>) -> IssuePass {
        IssuePass {
            class_id: class_id.into(),
            s_number: s_number.into(),
            name: "Alex".into(),
            expected_duration: expected,
            photo: None,
            reason: Some("Restroom".into()),
        }
    }

    fn photo_count(photos: &PhotoStore) -> usize {
        let dir = photos.root().join(PASS_PHOTO_FOLDER);
        std::fs::read_dir(dir).map_or(0, Iterator::count)
    }

    #[test]
    fn test_issue_pass_starts_active() {
        let f = fixture();
        let pass = f.manager.issue_pass(issue("P3", " s12345 ", Some(10))).unwrap();
        assert_eq!(pass.status, PassStatus::Active);
        assert_eq!(pass.s_number, "s12345");
        assert_eq!(pass.check_out_time, f.clock.now());
        assert_eq!(pass.check_in_time, None);
        assert_eq!(pass.actual_duration, None);
        assert_eq!(pass.check_out_reason.as_deref(), Some("Restroom"));
    }

    #[test]
    fn test_second_issue_conflicts_while_open() {
        let f = fixture();
        let first = f.manager.issue_pass(issue("P3", "s1", Some(10))).unwrap();
        for _ in 0..3 {
            let err = f.manager.issue_pass(issue("P3", "s1", None)).unwrap_err();
            assert!(matches!(
                err,
                HallPassError::ActivePassExists { pass_id, .. } if pass_id == first.id
            ));
        }

        // Still conflicts once overdue.
        f.clock.advance_minutes(11);
        Sweeper::new(f.store.clone(), f.clock.clone()).run_once().unwrap();
        assert!(f.manager.issue_pass(issue("P3", "s1", None)).is_err());

        // Different class is independent; after closing, a new pass is fine.
        f.manager.issue_pass(issue("P4", "s1", None)).unwrap();
        f.manager
            .close_pass("P3", "s1", ReturnDetails::default())
            .unwrap();
        f.manager.issue_pass(issue("P3", "s1", None)).unwrap();
    }

    #[test]
    fn test_issue_validation() {
        let f = fixture();
        assert!(matches!(
            f.manager.issue_pass(issue("", "s1", None)),
            Err(HallPassError::MissingField("classId"))
        ));
        assert!(matches!(
            f.manager.issue_pass(issue("P3", "  ", None)),
            Err(HallPassError::MissingField("s_number"))
        ));
        assert!(matches!(
            f.manager.issue_pass(issue("P3", "s1", Some(0))),
            Err(HallPassError::InvalidField { field: "expected_duration", .. })
        ));

        let mut long = issue("P3", "s1", None);
        long.reason = Some("x".repeat(MAX_REASON_LENGTH + 1));
        assert!(matches!(
            f.manager.issue_pass(long),
            Err(HallPassError::InvalidField { field: "reason", .. })
        ));

        let mut bad_photo = issue("P3", "s1", None);
        bad_photo.photo = Some("not-an-image".into());
        assert!(matches!(
            f.manager.issue_pass(bad_photo),
            Err(HallPassError::InvalidPhoto(_))
        ));
        assert!(f.store.find_open("P3", "s1").unwrap().is_none());
    }

    #[test]
    fn test_conflicting_issue_writes_no_photo() {
        let f = fixture();
        let mut with_photo = issue("P3", "s1", None);
        with_photo.photo = Some(PNG.into());
        let pass = f.manager.issue_pass(with_photo.clone()).unwrap();
        assert!(pass
            .check_out_photo
            .as_deref()
            .unwrap()
            .starts_with("hall_pass/checkout_s1_"));
        assert_eq!(photo_count(&f.photos), 1);

        assert!(f.manager.issue_pass(with_photo).is_err());
        assert_eq!(photo_count(&f.photos), 1);
    }

    #[test]
    fn test_close_computes_floor_minutes() {
        let f = fixture();
        f.manager.issue_pass(issue("P3", "s1", Some(10))).unwrap();
        f.clock.advance(Duration::seconds(7 * 60 + 59));
        let closed = f
            .manager
            .close_pass(
                "P3",
                "s1",
                ReturnDetails {
                    photo: Some(PNG.into()),
                    notes: Some("  back  ".into()),
                },
            )
            .unwrap();
        assert_eq!(closed.status, PassStatus::Completed);
        assert_eq!(closed.actual_duration, Some(7));
        assert_eq!(closed.check_in_time, Some(f.clock.now()));
        assert_eq!(closed.check_in_notes.as_deref(), Some("back"));
        assert!(closed.check_in_photo.is_some());
    }

    #[test]
    fn test_close_clamps_clock_skew_to_zero() {
        let f = fixture();
        f.manager.issue_pass(issue("P3", "s1", None)).unwrap();
        f.clock.advance_minutes(-5);
        let closed = f
            .manager
            .close_pass("P3", "s1", ReturnDetails::default())
            .unwrap();
        assert_eq!(closed.actual_duration, Some(0));
    }

    #[test]
    fn test_close_without_open_pass() {
        let f = fixture();
        let err = f
            .manager
            .close_pass("P3", "s1", ReturnDetails::default())
            .unwrap_err();
        assert!(matches!(err, HallPassError::NoActivePass { .. }));
    }

    #[test]
    fn test_close_by_id_twice_is_already_closed() {
        let f = fixture();
        let pass = f.manager.issue_pass(issue("P3", "s1", None)).unwrap();
        f.clock.advance_minutes(3);
        let closed = f
            .manager
            .close_pass_by_id(pass.id, ReturnDetails::default())
            .unwrap();
        assert_eq!(closed.actual_duration, Some(3));

        f.clock.advance_minutes(3);
        let err = f
            .manager
            .close_pass_by_id(pass.id, ReturnDetails::default())
            .unwrap_err();
        assert!(matches!(err, HallPassError::AlreadyClosed(id) if id == pass.id));

        // Duration is never recomputed.
        let stored = f.manager.get_pass(pass.id).unwrap().unwrap();
        assert_eq!(stored.actual_duration, Some(3));

        assert!(matches!(
            f.manager.close_pass_by_id(999, ReturnDetails::default()),
            Err(HallPassError::PassNotFound(999))
        ));
    }

    #[test]
    fn test_close_losing_race_reports_already_closed() {
        let f = fixture();
        let pass = f.manager.issue_pass(issue("P3", "s1", None)).unwrap();
        let stale = f.store.get(pass.id).unwrap().unwrap();
        f.manager
            .close_pass("P3", "s1", ReturnDetails::default())
            .unwrap();

        let err = f.manager.finish(&stale, None, None).unwrap_err();
        assert!(matches!(err, HallPassError::AlreadyClosed(_)));
    }

    #[test]
    fn test_derive_status() {
        let f = fixture();
        let pass = f.manager.issue_pass(issue("P3", "s1", Some(10))).unwrap();
        let t0 = pass.check_out_time;
        assert_eq!(derive_status(&pass, t0 + Duration::minutes(10)), PassStatus::Active);
        assert_eq!(
            derive_status(&pass, t0 + Duration::minutes(10) + Duration::seconds(1)),
            PassStatus::Overdue
        );

        let untimed = f.manager.issue_pass(issue("P3", "s2", None)).unwrap();
        assert_eq!(derive_status(&untimed, t0 + Duration::days(2)), PassStatus::Active);

        let mut completed = pass;
        completed.status = PassStatus::Completed;
        assert_eq!(
            derive_status(&completed, t0 + Duration::days(2)),
            PassStatus::Completed
        );
    }

    #[test]
    fn test_get_active_pass_applies_overdue_lazily() {
        let f = fixture();
        let pass = f.manager.issue_pass(issue("P3", "s1", Some(10))).unwrap();
        f.clock.advance_minutes(12);
        let read = f.manager.get_active_pass("P3", "s1").unwrap().unwrap();
        assert_eq!(read.status, PassStatus::Overdue);
        assert_eq!(f.store.get(pass.id).unwrap().unwrap().status, PassStatus::Overdue);
        assert!(f.manager.get_active_pass("P3", "s2").unwrap().is_none());
    }

    #[test]
    fn test_overdue_pass_closes_to_completed() {
        let f = fixture();
        f.manager.issue_pass(issue("P3", "s12345", Some(10))).unwrap();
        f.clock.advance_minutes(12);
        let report = Sweeper::new(f.store.clone(), f.clock.clone()).run_once().unwrap();
        assert_eq!(report.flipped, 1);
        assert_eq!(
            f.manager.get_active_pass("P3", "s12345").unwrap().unwrap().status,
            PassStatus::Overdue
        );

        f.clock.advance_minutes(3);
        let closed = f
            .manager
            .close_pass("P3", "s12345", ReturnDetails::default())
            .unwrap();
        assert_eq!(closed.status, PassStatus::Completed);
        assert_eq!(closed.actual_duration, Some(15));
    }

    #[test]
    fn test_open_passes_and_history() {
        let f = fixture();
        f.manager.issue_pass(issue("P3", "s1", Some(5))).unwrap();
        f.clock.advance_minutes(1);
        f.manager.issue_pass(issue("P3", "s2", None)).unwrap();
        f.manager.issue_pass(issue("P4", "s3", None)).unwrap();
        f.clock.advance_minutes(1);
        f.manager
            .close_pass("P3", "s2", ReturnDetails::default())
            .unwrap();
        f.clock.advance_minutes(10);

        let open = f.manager.open_passes("P3").unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].s_number, "s1");
        assert_eq!(open[0].status, PassStatus::Overdue);

        let history = f.manager.history("P3", None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].s_number, "s2");
        assert_eq!(history[0].status, PassStatus::Completed);

        // 15:00 UTC on 2025-10-28 is 10:00 in Chicago.
        let today = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();
        assert_eq!(f.manager.history("P3", Some(today)).unwrap().len(), 2);
        let yesterday = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
        assert!(f.manager.history("P3", Some(yesterday)).unwrap().is_empty());
    }

    #[test]
    fn test_export_log_uses_history_order_and_statuses() {
        let f = fixture();
        f.manager.issue_pass(issue("P3", "s1", Some(5))).unwrap();
        f.clock.advance_minutes(1);
        f.manager.issue_pass(issue("P3", "s2", None)).unwrap();
        f.clock.advance_minutes(3);
        f.manager
            .close_pass("P3", "s2", ReturnDetails::default())
            .unwrap();
        f.clock.advance_minutes(10);

        let csv = String::from_utf8(f.manager.export_log("P3", None).unwrap()).unwrap();
        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[1],
            "s2,Alex,2025-10-28 10:01:00,2025-10-28 10:04:00,3,Restroom,,completed"
        );
        assert_eq!(
            rows[2],
            "s1,Alex,2025-10-28 10:00:00,Not returned,N/A,Restroom,,overdue"
        );

        let yesterday = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
        let empty = f.manager.export_log("P3", Some(yesterday)).unwrap();
        assert_eq!(String::from_utf8(empty).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_refresh_reports_stored_row_after_concurrent_close() {
        let f = fixture();
        let pass = f.manager.issue_pass(issue("P3", "s1", Some(10))).unwrap();
        let stale = f.store.get(pass.id).unwrap().unwrap();
        f.manager
            .close_pass("P3", "s1", ReturnDetails::default())
            .unwrap();
        f.clock.advance_minutes(12);

        let read = f.manager.refresh(stale, f.clock.now()).unwrap();
        assert_eq!(read.status, PassStatus::Completed);
        assert_eq!(read.actual_duration, Some(0));
    }

    #[test]
    fn test_parallel_checkouts_have_one_winner() {
        const THREADS: usize = 8;
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(crate::storage::SqliteStore::open(&dir.path().join("hallpass.db")).unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 10, 28, 15, 0, 0).unwrap(),
        ));
        let photos = PhotoStore::new(dir.path().join("photos"));
        let manager = PassManager::new(store, clock, photos.clone(), chrono_tz::America::Chicago);
        let barrier = Arc::new(std::sync::Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let manager = manager.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let mut request = issue("P3", "s12345", Some(10));
                    request.photo = Some(PNG.to_string());
                    barrier.wait();
                    manager.issue_pass(request)
                })
            })
            .collect();
        let results: Vec<Result<Pass>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, HallPassError::ActivePassExists { .. })));
        assert_eq!(manager.open_passes("P3").unwrap().len(), 1);
        // Losers leave no photo behind.
        assert_eq!(photo_count(&photos), 1);
    }

    #[test]
    fn test_elapsed_minutes() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(elapsed_minutes(t0, t0), 0);
        assert_eq!(elapsed_minutes(t0, t0 + Duration::seconds(59)), 0);
        assert_eq!(elapsed_minutes(t0, t0 + Duration::minutes(15)), 15);
        assert_eq!(elapsed_minutes(t0, t0 - Duration::minutes(2)), 0);
    }
}
