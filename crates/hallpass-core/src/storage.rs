//! SQLite-backed persistence for passes and attendance.
//!
//! One connection guarded by a mutex; every lookup-then-write runs inside an
//! `IMMEDIATE` transaction so concurrent writers from other processes are
//! excluded as well. Timestamps are stored as fixed-width RFC 3339 UTC text,
//! which keeps lexical and chronological order identical.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{HallPassError, Result};
use crate::repository::{AttendanceRepository, PassRepository};
use crate::types::{
    AttendanceRecord, Inserted, NewAttendance, NewPass, Pass, PassClosure, PassStatus,
};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS hall_passes (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    class_id          TEXT NOT NULL,
    s_number          TEXT NOT NULL,
    name              TEXT NOT NULL,
    check_out_time    TEXT NOT NULL,
    check_in_time     TEXT,
    expected_duration INTEGER,
    actual_duration   INTEGER,
    check_out_photo   TEXT,
    check_in_photo    TEXT,
    check_out_reason  TEXT,
    check_in_notes    TEXT,
    status            TEXT NOT NULL DEFAULT 'active'
                      CHECK(status IN ('active', 'completed', 'overdue'))
);

CREATE INDEX IF NOT EXISTS idx_hall_passes_active
    ON hall_passes(class_id, s_number, status);
CREATE INDEX IF NOT EXISTS idx_hall_passes_history
    ON hall_passes(class_id, check_out_time);

CREATE TABLE IF NOT EXISTS attendance (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    class_id      TEXT NOT NULL,
    s_number      TEXT NOT NULL,
    name          TEXT NOT NULL,
    day           TEXT NOT NULL,
    checked_in_at TEXT NOT NULL,
    photo         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attendance_day
    ON attendance(class_id, day, s_number);
";

const PASS_COLUMNS: &str = "id, class_id, s_number, name, check_out_time, check_in_time, \
     expected_duration, actual_duration, check_out_photo, check_in_photo, \
     check_out_reason, check_in_notes, status";

const ATTENDANCE_COLUMNS: &str = "id, class_id, s_number, name, day, checked_in_at, photo";

/// Default directory for the database and photos.
///
/// On Linux: `/var/lib/hallpass/`
/// Elsewhere: the platform data directory (e.g. `~/Library/Application Support/hallpass`).
pub fn default_data_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/var/lib/hallpass"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let dirs = directories::ProjectDirs::from("", "", "hallpass")
            .ok_or_else(|| HallPassError::Storage("Cannot determine data directory".into()))?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Default SQLite database path inside [`default_data_dir`].
pub fn default_database_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("attendance.db"))
}

/// SQLite implementation of both repositories.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened hall pass database");
        Self::with_connection(conn)
    }

    /// A private in-memory database; contents vanish on drop.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        debug!("Hall pass schema is up to date");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| HallPassError::Storage("database connection lock poisoned".into()))
    }
}

// -- column codecs --

fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| HallPassError::Storage(format!("bad timestamp '{s}' in store: {e}")))
}

fn encode_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn decode_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| HallPassError::Storage(format!("bad day '{s}' in store: {e}")))
}

/// Raw row, decoded into a [`Pass`] outside the rusqlite row callback.
struct PassRow {
    id: i64,
    class_id: String,
    s_number: String,
    name: String,
    check_out_time: String,
    check_in_time: Option<String>,
    expected_duration: Option<u32>,
    actual_duration: Option<u32>,
    check_out_photo: Option<String>,
    check_in_photo: Option<String>,
    check_out_reason: Option<String>,
    check_in_notes: Option<String>,
    status: String,
}

impl PassRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            class_id: row.get(1)?,
            s_number: row.get(2)?,
            name: row.get(3)?,
            check_out_time: row.get(4)?,
            check_in_time: row.get(5)?,
            expected_duration: row.get(6)?,
            actual_duration: row.get(7)?,
            check_out_photo: row.get(8)?,
            check_in_photo: row.get(9)?,
            check_out_reason: row.get(10)?,
            check_in_notes: row.get(11)?,
            status: row.get(12)?,
        })
    }

    fn decode(self) -> Result<Pass> {
        Ok(Pass {
            id: self.id,
            class_id: self.class_id,
            s_number: self.s_number,
            name: self.name,
            check_out_time: decode_time(&self.check_out_time)?,
            check_in_time: self.check_in_time.as_deref().map(decode_time).transpose()?,
            expected_duration: self.expected_duration,
            actual_duration: self.actual_duration,
            check_out_photo: self.check_out_photo,
            check_in_photo: self.check_in_photo,
            check_out_reason: self.check_out_reason,
            check_in_notes: self.check_in_notes,
            status: self.status.parse::<PassStatus>()?,
        })
    }
}

struct AttendanceRow {
    id: i64,
    class_id: String,
    s_number: String,
    name: String,
    day: String,
    checked_in_at: String,
    photo: String,
}

impl AttendanceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            class_id: row.get(1)?,
            s_number: row.get(2)?,
            name: row.get(3)?,
            day: row.get(4)?,
            checked_in_at: row.get(5)?,
            photo: row.get(6)?,
        })
    }

    fn decode(self) -> Result<AttendanceRecord> {
        Ok(AttendanceRecord {
            id: self.id,
            class_id: self.class_id,
            s_number: self.s_number,
            name: self.name,
            day: decode_day(&self.day)?,
            checked_in_at: decode_time(&self.checked_in_at)?,
            photo: self.photo,
        })
    }
}

fn query_passes<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Pass>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, PassRow::from_row)?;
    let mut passes = Vec::new();
    for row in rows {
        passes.push(row?.decode()?);
    }
    Ok(passes)
}

fn query_pass<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<Pass>> {
    conn.query_row(sql, params, PassRow::from_row)
        .optional()?
        .map(PassRow::decode)
        .transpose()
}

fn find_open_in(conn: &Connection, class_id: &str, s_number: &str) -> Result<Option<Pass>> {
    query_pass(
        conn,
        &format!(
            "SELECT {PASS_COLUMNS} FROM hall_passes \
             WHERE class_id = ?1 AND s_number = ?2 AND status IN ('active', 'overdue') \
             ORDER BY check_out_time DESC, id DESC LIMIT 1"
        ),
        params![class_id, s_number],
    )
}

fn get_in(conn: &Connection, id: i64) -> Result<Option<Pass>> {
    query_pass(
        conn,
        &format!("SELECT {PASS_COLUMNS} FROM hall_passes WHERE id = ?1"),
        params![id],
    )
}

fn find_attendance_in(
    conn: &Connection,
    class_id: &str,
    s_number: &str,
    day: NaiveDate,
) -> Result<Option<AttendanceRecord>> {
    conn.query_row(
        &format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE class_id = ?1 AND s_number = ?2 AND day = ?3 \
             ORDER BY id LIMIT 1"
        ),
        params![class_id, s_number, encode_day(day)],
        AttendanceRow::from_row,
    )
    .optional()?
    .map(AttendanceRow::decode)
    .transpose()
}

impl PassRepository for SqliteStore {
    fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn insert_if_no_open(&self, new: NewPass) -> Result<Inserted<Pass>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = find_open_in(&tx, &new.class_id, &new.s_number)? {
            tx.commit()?;
            return Ok(Inserted::Existing(existing));
        }

        tx.execute(
            "INSERT INTO hall_passes \
             (class_id, s_number, name, check_out_time, expected_duration, \
              check_out_photo, check_out_reason, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active')",
            params![
                new.class_id,
                new.s_number,
                new.name,
                encode_time(new.check_out_time),
                new.expected_duration,
                new.check_out_photo,
                new.check_out_reason,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Inserted::Created(new.into_pass(id)))
    }

    fn find_open(&self, class_id: &str, s_number: &str) -> Result<Option<Pass>> {
        let conn = self.lock()?;
        find_open_in(&conn, class_id, s_number)
    }

    fn get(&self, id: i64) -> Result<Option<Pass>> {
        let conn = self.lock()?;
        get_in(&conn, id)
    }

    fn close(&self, id: i64, closure: &PassClosure) -> Result<Option<Pass>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE hall_passes \
             SET check_in_time = ?2, actual_duration = ?3, check_in_photo = ?4, \
                 check_in_notes = ?5, status = 'completed' \
             WHERE id = ?1 AND status IN ('active', 'overdue')",
            params![
                id,
                encode_time(closure.check_in_time),
                closure.actual_duration,
                closure.check_in_photo,
                closure.check_in_notes,
            ],
        )?;
        if changed == 0 {
            tx.commit()?;
            return Ok(None);
        }
        let pass = get_in(&tx, id)?;
        tx.commit()?;
        Ok(pass)
    }

    fn mark_overdue(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE hall_passes SET status = 'overdue' WHERE id = ?1 AND status = 'active'",
            params![id],
        )?;
        Ok(changed > 0)
    }

    fn list_active(&self) -> Result<Vec<Pass>> {
        let conn = self.lock()?;
        query_passes(
            &conn,
            &format!("SELECT {PASS_COLUMNS} FROM hall_passes WHERE status = 'active' ORDER BY id"),
            [],
        )
    }

    fn list_open_for_class(&self, class_id: &str) -> Result<Vec<Pass>> {
        let conn = self.lock()?;
        query_passes(
            &conn,
            &format!(
                "SELECT {PASS_COLUMNS} FROM hall_passes \
                 WHERE class_id = ?1 AND status IN ('active', 'overdue') \
                 ORDER BY check_out_time DESC, id DESC"
            ),
            params![class_id],
        )
    }

    fn list_for_class(
        &self,
        class_id: &str,
        window: Option<Range<DateTime<Utc>>>,
    ) -> Result<Vec<Pass>> {
        let conn = self.lock()?;
        match window {
            Some(w) => query_passes(
                &conn,
                &format!(
                    "SELECT {PASS_COLUMNS} FROM hall_passes \
                     WHERE class_id = ?1 AND check_out_time >= ?2 AND check_out_time < ?3 \
                     ORDER BY check_out_time DESC, id DESC"
                ),
                params![class_id, encode_time(w.start), encode_time(w.end)],
            ),
            None => query_passes(
                &conn,
                &format!(
                    "SELECT {PASS_COLUMNS} FROM hall_passes WHERE class_id = ?1 \
                     ORDER BY check_out_time DESC, id DESC"
                ),
                params![class_id],
            ),
        }
    }
}

impl AttendanceRepository for SqliteStore {
    fn insert_if_absent(&self, new: NewAttendance) -> Result<Inserted<AttendanceRecord>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = find_attendance_in(&tx, &new.class_id, &new.s_number, new.day)? {
            tx.commit()?;
            return Ok(Inserted::Existing(existing));
        }

        tx.execute(
            "INSERT INTO attendance (class_id, s_number, name, day, checked_in_at, photo) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.class_id,
                new.s_number,
                new.name,
                encode_day(new.day),
                encode_time(new.checked_in_at),
                new.photo,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Inserted::Created(new.into_record(id)))
    }

    fn find(
        &self,
        class_id: &str,
        s_number: &str,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let conn = self.lock()?;
        find_attendance_in(&conn, class_id, s_number, day)
    }

    fn list_for_day(&self, class_id: &str, day: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE class_id = ?1 AND day = ?2 ORDER BY checked_in_at, id"
        ))?;
        let rows = stmt.query_map(params![class_id, encode_day(day)], AttendanceRow::from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.decode()?);
        }
        Ok(records)
    }

    fn list_all_for_class(&self, class_id: &str) -> Result<Vec<AttendanceRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE class_id = ?1 ORDER BY day, checked_in_at, id"
        ))?;
        let rows = stmt.query_map(params![class_id], AttendanceRow::from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.decode()?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 28, 15, 0, 0).unwrap()
    }

    fn new_pass(s_number: &str, at: DateTime<Utc>) -> NewPass {
        NewPass {
            class_id: "P3".into(),
            s_number: s_number.into(),
            name: "Alex Rivera".into(),
            check_out_time: at,
            expected_duration: Some(10),
            check_out_photo: Some("hall_pass/a.png".into()),
            check_out_reason: Some("Restroom".into()),
        }
    }

    #[test]
    fn test_schema_is_idempotent_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("attendance.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_if_no_open(new_pass("s1", t0())).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        store.ping().unwrap();
        let open = store.find_open("P3", "s1").unwrap().unwrap();
        assert_eq!(open.name, "Alex Rivera");
        assert_eq!(open.check_out_time, t0());
        assert_eq!(open.status, PassStatus::Active);
    }

    #[test]
    fn test_insert_if_no_open_blocks_second_pass() {
        let store = SqliteStore::open_in_memory().unwrap();
        let Inserted::Created(first) = store.insert_if_no_open(new_pass("s1", t0())).unwrap()
        else {
            panic!("expected create");
        };
        let second = store
            .insert_if_no_open(new_pass("s1", t0() + Duration::minutes(2)))
            .unwrap();
        assert_eq!(second, Inserted::Existing(first.clone()));

        assert!(store.mark_overdue(first.id).unwrap());
        let third = store.insert_if_no_open(new_pass("s1", t0())).unwrap();
        assert!(matches!(third, Inserted::Existing(p) if p.status == PassStatus::Overdue));
    }

    #[test]
    fn test_close_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let Inserted::Created(pass) = store.insert_if_no_open(new_pass("s1", t0())).unwrap()
        else {
            panic!("expected create");
        };
        let closure = PassClosure {
            check_in_time: t0() + Duration::minutes(15),
            actual_duration: 15,
            check_in_photo: None,
            check_in_notes: Some("returned".into()),
        };
        let closed = store.close(pass.id, &closure).unwrap().unwrap();
        assert_eq!(closed.status, PassStatus::Completed);
        assert_eq!(closed.actual_duration, Some(15));
        assert_eq!(closed.check_in_time, Some(t0() + Duration::minutes(15)));
        assert_eq!(closed.check_in_notes.as_deref(), Some("returned"));

        assert!(store.close(pass.id, &closure).unwrap().is_none());
        assert!(!store.mark_overdue(pass.id).unwrap());
        assert!(store.find_open("P3", "s1").unwrap().is_none());
    }

    #[test]
    fn test_history_window_uses_checkout_time() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_if_no_open(new_pass("s1", t0())).unwrap();
        store
            .insert_if_no_open(new_pass("s2", t0() + Duration::days(1)))
            .unwrap();

        let all = store.list_for_class("P3", None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].s_number, "s2");

        let window = t0() - Duration::hours(1)..t0() + Duration::hours(1);
        let day = store.list_for_class("P3", Some(window)).unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].s_number, "s1");
        assert!(store.list_for_class("P9", None).unwrap().is_empty());
    }

    #[test]
    fn test_attendance_insert_if_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();
        let new = NewAttendance {
            class_id: "P3".into(),
            s_number: "s1".into(),
            name: "Alex Rivera".into(),
            day,
            checked_in_at: t0(),
            photo: "2025-10-28/a.png".into(),
        };
        let Inserted::Created(first) = store.insert_if_absent(new.clone()).unwrap() else {
            panic!("expected create");
        };

        let retry = NewAttendance {
            checked_in_at: t0() + Duration::minutes(3),
            photo: "2025-10-28/b.png".into(),
            ..new
        };
        assert_eq!(
            store.insert_if_absent(retry).unwrap(),
            Inserted::Existing(first.clone())
        );
        assert_eq!(store.find("P3", "s1", day).unwrap(), Some(first));
        assert_eq!(store.list_for_day("P3", day).unwrap().len(), 1);
    }

    #[test]
    fn test_attendance_list_for_class_orders_by_day() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();
        for (s_number, offset) in [("s2", 1), ("s1", 0), ("s3", 1)] {
            store
                .insert_if_absent(NewAttendance {
                    class_id: "P3".into(),
                    s_number: s_number.into(),
                    name: s_number.into(),
                    day: day + Duration::days(offset),
                    checked_in_at: t0() + Duration::days(offset),
                    photo: format!("{s_number}.png"),
                })
                .unwrap();
        }
        let order: Vec<String> = store
            .list_all_for_class("P3")
            .unwrap()
            .into_iter()
            .map(|r| r.s_number)
            .collect();
        assert_eq!(order, ["s1", "s2", "s3"]);
        assert!(store.list_all_for_class("P9").unwrap().is_empty());
    }
}
