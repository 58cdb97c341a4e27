//! Unified error types for the hallpass core library.
//!
//! [`HallPassError`] covers every failure mode of the attendance and hall-pass
//! operations. Each variant belongs to exactly one [`ErrorKind`], which is what
//! the HTTP front door uses to pick a transport status code.
//!
//! # Example
//!
//! ```rust
//! use hallpass_core::error::{ErrorKind, HallPassError};
//!
//! let err = HallPassError::MissingField("s_number");
//! assert_eq!(err.kind(), ErrorKind::Validation);
//! assert_eq!(err.http_status_code(), 400);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// The unified error type for all hallpass operations.
#[derive(Debug, Error)]
pub enum HallPassError {
    // =========================================================================
    // VALIDATION ERRORS
    // =========================================================================
    /// A required field was missing or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field was present but its value is not acceptable.
    #[error("Invalid {field}: {message}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The photo payload is not an image data URL or cannot be decoded.
    #[error("Missing or invalid photo: {0}")]
    InvalidPhoto(String),

    // =========================================================================
    // STATE ERRORS
    // =========================================================================
    /// The student already has an open pass in this class.
    #[error("Student {student_id} already has an active hall pass in class {class_id}")]
    ActivePassExists {
        /// Class scope of the conflicting pass.
        class_id: String,
        /// Student holding the pass.
        student_id: String,
        /// Id of the pass that is still open.
        pass_id: i64,
    },

    /// No open pass exists for the student in this class.
    #[error("No active hall pass for student {student_id} in class {class_id}")]
    NoActivePass {
        /// Class scope searched.
        class_id: String,
        /// Student searched for.
        student_id: String,
    },

    /// No pass exists with the given id.
    #[error("Hall pass {0} not found")]
    PassNotFound(i64),

    /// The student is not on the class roster.
    #[error("S-number {student_id} not found in class {class_id}")]
    StudentNotFound {
        /// Class whose roster was searched.
        class_id: String,
        /// Student searched for.
        student_id: String,
    },

    /// The pass has already been checked back in.
    #[error("Hall pass {0} is already closed")]
    AlreadyClosed(i64),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// The repository failed in a way not covered by a more specific variant.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The SQLite driver reported an error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A CSV report could not be written.
    #[error("Export failed: {0}")]
    Export(#[from] csv::Error),
}

/// A specialized [`Result`] type for hallpass operations.
pub type Result<T> = std::result::Result<T, HallPassError>;

/// Coarse failure category, preserved through the result envelope so the
/// transport layer can choose a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed input.
    Validation,
    /// A second open pass was requested.
    Conflict,
    /// The referenced pass, student or record does not exist.
    NotFound,
    /// The pass was closed before.
    AlreadyClosed,
    /// Configuration could not be loaded.
    Config,
    /// The repository failed.
    Storage,
}

impl ErrorKind {
    /// HTTP status code for failures of this kind.
    #[must_use]
    pub const fn http_status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict | Self::AlreadyClosed => 409,
            Self::Config | Self::Storage => 500,
        }
    }
}

impl HallPassError {
    /// Shorthand for an [`HallPassError::InvalidField`].
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }

    /// Returns the failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) | Self::InvalidField { .. } | Self::InvalidPhoto(_) => {
                ErrorKind::Validation
            }
            Self::ActivePassExists { .. } => ErrorKind::Conflict,
            Self::NoActivePass { .. } | Self::PassNotFound(_) | Self::StudentNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::AlreadyClosed(_) => ErrorKind::AlreadyClosed,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_) => {
                ErrorKind::Config
            }
            Self::Storage(_) | Self::Database(_) | Self::IoError(_) | Self::Export(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::InvalidPhoto(_) => "INVALID_PHOTO",
            Self::ActivePassExists { .. } => "ACTIVE_PASS_EXISTS",
            Self::NoActivePass { .. } => "NO_ACTIVE_PASS",
            Self::PassNotFound(_) => "PASS_NOT_FOUND",
            Self::StudentNotFound { .. } => "STUDENT_NOT_FOUND",
            Self::AlreadyClosed(_) => "PASS_ALREADY_CLOSED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::IoError(_) => "IO_ERROR",
            Self::Export(_) => "EXPORT_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for HallPassError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::Serialize(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::Write { path, source } => {
                Self::Storage(format!("Failed to write {}: {}", path.display(), source))
            }
            ConfigError::Validation { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::UnknownDirectory => {
                Self::ConfigValidationError("cannot determine configuration directory".into())
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind as IoKind};

    #[test]
    fn test_validation_classification() {
        assert_eq!(HallPassError::MissingField("classId").kind(), ErrorKind::Validation);
        assert_eq!(
            HallPassError::invalid("expected_duration", "must be positive").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            HallPassError::InvalidPhoto("not a data url".into()).kind(),
            ErrorKind::Validation
        );
        assert_ne!(HallPassError::AlreadyClosed(1).kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_kinds() {
        let conflict = HallPassError::ActivePassExists {
            class_id: "P3".into(),
            student_id: "s1".into(),
            pass_id: 4,
        };
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert_eq!(HallPassError::PassNotFound(9).kind(), ErrorKind::NotFound);
        assert_eq!(HallPassError::AlreadyClosed(9).kind(), ErrorKind::AlreadyClosed);
        assert_eq!(HallPassError::Storage("disk".into()).kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(HallPassError::MissingField("s_number").http_status_code(), 400);
        assert_eq!(
            HallPassError::NoActivePass {
                class_id: "P3".into(),
                student_id: "s1".into()
            }
            .http_status_code(),
            404
        );
        assert_eq!(HallPassError::AlreadyClosed(1).http_status_code(), 409);
        assert_eq!(HallPassError::Storage("x".into()).http_status_code(), 500);
        assert_eq!(
            HallPassError::ConfigNotFound(PathBuf::new()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(HallPassError::AlreadyClosed(1).error_code(), "PASS_ALREADY_CLOSED");
        assert_eq!(HallPassError::PassNotFound(1).error_code(), "PASS_NOT_FOUND");
    }

    #[test]
    fn test_from_io_error() {
        let err: HallPassError = IoErr::new(IoKind::NotFound, "gone").into();
        assert!(matches!(err, HallPassError::IoError(_)));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_error_display_messages() {
        let err = HallPassError::StudentNotFound {
            class_id: "P3".into(),
            student_id: "s999".into(),
        };
        assert_eq!(err.to_string(), "S-number s999 not found in class P3");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::AlreadyClosed).unwrap();
        assert_eq!(json, "\"already_closed\"");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<HallPassError>();
        assert_sync::<HallPassError>();
    }
}
