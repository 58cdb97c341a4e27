//! # hallpass-core
//!
//! Core business logic for the hallpass classroom attendance and hall-pass
//! tracking system.
//!
//! This crate provides:
//! - Photo-verified daily check-in, idempotent per class, student and day
//! - Hall pass lifecycle (checkout, overdue, check-in) with duration tracking
//! - A background sweeper that marks overdue passes
//! - SQLite persistence behind narrow repository traits
//! - CSV exports of the pass log and daily attendance, plus attendance rates
//! - Configuration management (classes, rosters, timezone, storage paths)
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`clock`] - Injectable time source and local-day helpers
//! - [`types`] - Shared records and OpenAPI schemas
//! - [`repository`] - Storage traits and the in-memory store
//! - [`storage`] - SQLite store and default data paths
//! - [`passes`] - Hall pass state machine and the `derive_status` rule
//! - [`attendance`] - Daily check-in
//! - [`sweeper`] - Periodic `active → overdue` sweep
//! - [`outcome`] - Response envelope for state machine results
//! - [`reports`] - CSV exports and the attendance summary
//! - [`config`] - Configuration loading, saving, and validation
//! - [`roster`] - Student lookup within a class
//! - [`photos`] - Image data URL decoding and on-disk photo storage
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod attendance;
pub mod clock;
pub mod config;
pub mod error;
pub mod outcome;
pub mod passes;
pub mod photos;
pub mod reports;
pub mod repository;
pub mod roster;
pub mod storage;
pub mod sweeper;
pub mod types;

// Re-export primary types for convenience
pub use self::attendance::{AttendanceBook, CheckInOutcome};
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::config::{
    AttendanceConfig, ClassConfig, Config, ConfigError, ConfigResult, PassesConfig,
    ServerConfig, StorageConfig,
};
pub use self::error::{ErrorKind, HallPassError, Result};
pub use self::outcome::{map_result, Envelope, Failure, IntoEnvelope, Success};
pub use self::passes::{
    derive_status, elapsed_minutes, IssuePass, PassManager, ReturnDetails, MAX_REASON_LENGTH,
};
pub use self::photos::PhotoStore;
pub use self::reports::{
    attendance_csv, pass_log_csv, summarize_attendance, AttendanceSummary, StudentAttendance,
};
pub use self::repository::{AttendanceRepository, MemoryStore, PassRepository};
pub use self::roster::{first_name, Student};
pub use self::storage::{default_data_dir, default_database_path, SqliteStore};
pub use self::sweeper::{SweepReport, Sweeper};
pub use self::types::{AttendanceRecord, CheckInStatus, Inserted, Pass, PassStatus};
