//! Persistence-facing interfaces.
//!
//! The state machine only talks to storage through these traits. Both
//! `insert_*` methods are atomic lookup-then-write primitives: an
//! implementation must make the existence check and the insert indivisible
//! for the key involved, which is what keeps "one open pass per student and
//! class" and "one attendance row per student, class and day" true under
//! concurrent requests.
//!
//! [`MemoryStore`] implements both traits behind a single mutex and backs the
//! unit tests; [`crate::storage::SqliteStore`] is the production store.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{HallPassError, Result};
use crate::types::{
    AttendanceRecord, Inserted, NewAttendance, NewPass, Pass, PassClosure, PassStatus,
};

/// Storage operations on hall passes.
pub trait PassRepository: Send + Sync {
    /// Cheap round trip proving the store is reachable.
    fn ping(&self) -> Result<()>;

    /// Insert `new` unless the student already has an `active` or `overdue`
    /// pass in the same class, in which case that pass is returned untouched.
    fn insert_if_no_open(&self, new: NewPass) -> Result<Inserted<Pass>>;

    /// The student's `active` or `overdue` pass in a class, if any.
    fn find_open(&self, class_id: &str, s_number: &str) -> Result<Option<Pass>>;

    /// A pass by id, in any state.
    fn get(&self, id: i64) -> Result<Option<Pass>>;

    /// Apply `closure` and set `completed`, only if the pass is still open.
    ///
    /// Returns `None` when the pass does not exist or was already completed.
    fn close(&self, id: i64, closure: &PassClosure) -> Result<Option<Pass>>;

    /// Flip the pass to `overdue`, only if it is still `active`.
    ///
    /// Returns whether a row changed.
    fn mark_overdue(&self, id: i64) -> Result<bool>;

    /// Every `active` pass in every class.
    fn list_active(&self) -> Result<Vec<Pass>>;

    /// Open passes of a class, newest checkout first.
    fn list_open_for_class(&self, class_id: &str) -> Result<Vec<Pass>>;

    /// All passes of a class, newest checkout first, optionally restricted to
    /// checkouts inside `window`.
    fn list_for_class(
        &self,
        class_id: &str,
        window: Option<Range<DateTime<Utc>>>,
    ) -> Result<Vec<Pass>>;
}

/// Storage operations on daily attendance.
pub trait AttendanceRepository: Send + Sync {
    /// Insert `new` unless a record for the same class, student and day
    /// exists, in which case that record is returned untouched.
    fn insert_if_absent(&self, new: NewAttendance) -> Result<Inserted<AttendanceRecord>>;

    /// The record for a class, student and day.
    fn find(&self, class_id: &str, s_number: &str, day: NaiveDate)
        -> Result<Option<AttendanceRecord>>;

    /// All records of a class on a day, in check-in order.
    fn list_for_day(&self, class_id: &str, day: NaiveDate) -> Result<Vec<AttendanceRecord>>;

    /// Every record for a class, oldest day first.
    fn list_all_for_class(&self, class_id: &str) -> Result<Vec<AttendanceRecord>>;
}

/// In-process store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    passes: BTreeMap<i64, Pass>,
    attendance: BTreeMap<i64, AttendanceRecord>,
    next_pass_id: i64,
    next_attendance_id: i64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| HallPassError::Storage("memory store lock poisoned".into()))
    }
}

fn newest_first(passes: &mut [Pass]) {
    passes.sort_by(|a, b| {
        b.check_out_time
            .cmp(&a.check_out_time)
            .then_with(|| b.id.cmp(&a.id))
    });
}

impl PassRepository for MemoryStore {
    fn ping(&self) -> Result<()> {
        self.lock().map(drop)
    }

    fn insert_if_no_open(&self, new: NewPass) -> Result<Inserted<Pass>> {
        let mut inner = self.lock()?;
        let open = inner.passes.values().find(|p| {
            p.class_id == new.class_id && p.s_number == new.s_number && p.status.is_open()
        });
        if let Some(existing) = open {
            return Ok(Inserted::Existing(existing.clone()));
        }
        inner.next_pass_id += 1;
        let pass = new.into_pass(inner.next_pass_id);
        inner.passes.insert(pass.id, pass.clone());
        Ok(Inserted::Created(pass))
    }

    fn find_open(&self, class_id: &str, s_number: &str) -> Result<Option<Pass>> {
        let inner = self.lock()?;
        let mut open: Vec<Pass> = inner
            .passes
            .values()
            .filter(|p| p.class_id == class_id && p.s_number == s_number && p.status.is_open())
            .cloned()
            .collect();
        newest_first(&mut open);
        Ok(open.into_iter().next())
    }

    fn get(&self, id: i64) -> Result<Option<Pass>> {
        Ok(self.lock()?.passes.get(&id).cloned())
    }

    fn close(&self, id: i64, closure: &PassClosure) -> Result<Option<Pass>> {
        let mut inner = self.lock()?;
        match inner.passes.get_mut(&id) {
            Some(pass) if pass.status.is_open() => {
                pass.check_in_time = Some(closure.check_in_time);
                pass.actual_duration = Some(closure.actual_duration);
                pass.check_in_photo.clone_from(&closure.check_in_photo);
                pass.check_in_notes.clone_from(&closure.check_in_notes);
                pass.status = PassStatus::Completed;
                Ok(Some(pass.clone()))
            }
            _ => Ok(None),
        }
    }

    fn mark_overdue(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.passes.get_mut(&id) {
            Some(pass) if pass.status == PassStatus::Active => {
                pass.status = PassStatus::Overdue;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list_active(&self) -> Result<Vec<Pass>> {
        Ok(self
            .lock()?
            .passes
            .values()
            .filter(|p| p.status == PassStatus::Active)
            .cloned()
            .collect())
    }

    fn list_open_for_class(&self, class_id: &str) -> Result<Vec<Pass>> {
        let mut open: Vec<Pass> = self
            .lock()?
            .passes
            .values()
            .filter(|p| p.class_id == class_id && p.status.is_open())
            .cloned()
            .collect();
        newest_first(&mut open);
        Ok(open)
    }

    fn list_for_class(
        &self,
        class_id: &str,
        window: Option<Range<DateTime<Utc>>>,
    ) -> Result<Vec<Pass>> {
        let mut passes: Vec<Pass> = self
            .lock()?
            .passes
            .values()
            .filter(|p| p.class_id == class_id)
            .filter(|p| {
                window
                    .as_ref()
                    .map_or(true, |w| w.contains(&p.check_out_time))
            })
            .cloned()
            .collect();
        newest_first(&mut passes);
        Ok(passes)
    }
}

impl AttendanceRepository for MemoryStore {
    fn insert_if_absent(&self, new: NewAttendance) -> Result<Inserted<AttendanceRecord>> {
        let mut inner = self.lock()?;
        let existing = inner.attendance.values().find(|r| {
            r.class_id == new.class_id && r.s_number == new.s_number && r.day == new.day
        });
        if let Some(record) = existing {
            return Ok(Inserted::Existing(record.clone()));
        }
        inner.next_attendance_id += 1;
        let record = new.into_record(inner.next_attendance_id);
        inner.attendance.insert(record.id, record.clone());
        Ok(Inserted::Created(record))
    }

    fn find(
        &self,
        class_id: &str,
        s_number: &str,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        Ok(self
            .lock()?
            .attendance
            .values()
            .find(|r| r.class_id == class_id && r.s_number == s_number && r.day == day)
            .cloned())
    }

    fn list_for_day(&self, class_id: &str, day: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .lock()?
            .attendance
            .values()
            .filter(|r| r.class_id == class_id && r.day == day)
            .cloned()
            .collect())
    }

    fn list_all_for_class(&self, class_id: &str) -> Result<Vec<AttendanceRecord>> {
        let mut records: Vec<AttendanceRecord> = self
            .lock()?
            .attendance
            .values()
            .filter(|r| r.class_id == class_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| (a.day, a.checked_in_at, a.id).cmp(&(b.day, b.checked_in_at, b.id)));
        Ok(records)
    }
}
