//! Application configuration management.
//!
//! Handles loading, saving, and validating hallpass configuration including:
//! - The class list, each with its roster
//! - The default class used when a request names an unknown class
//! - The timezone that decides which calendar day a check-in counts for
//! - Storage paths, listen address and sweeper cadence
//!
//! Configuration is read from a TOML file and layered with environment
//! overrides of the form `HALLPASS__PASSES__SWEEP_INTERVAL_SECS=30`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roster::Student;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "HALLPASS_CONFIG";

static CLASS_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,32}$").expect("class id regex is valid"));

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration file does not exist.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file or environment could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// The configuration could not be rendered as TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configuration could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A value failed validation.
    #[error("{field}: {message}")]
    Validation {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The platform configuration directory could not be determined.
    #[error("cannot determine configuration directory")]
    UnknownDirectory,
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Class used when a request omits or misspells its class id.
    #[serde(default)]
    pub default_class: Option<String>,

    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database and photo locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Daily attendance settings.
    #[serde(default)]
    pub attendance: AttendanceConfig,

    /// Hall pass settings.
    #[serde(default)]
    pub passes: PassesConfig,

    /// Classes in display order.
    #[serde(default = "default_classes")]
    pub classes: Vec<ClassConfig>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage locations. Unset paths fall back to the platform data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Directory photos are written to.
    #[serde(default)]
    pub photos_dir: Option<PathBuf>,
}

/// Attendance settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// IANA timezone that defines "today".
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// Hall pass settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassesConfig {
    /// Expected duration applied when a checkout request does not give one.
    /// `None` issues passes that never turn overdue on their own.
    #[serde(default = "default_expected_minutes")]
    pub default_expected_minutes: Option<u32>,

    /// Seconds between periodic overdue sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// A class and its roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Short identifier sent by clients as `classId`.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Enrolled students.
    #[serde(default)]
    pub students: Vec<Student>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5006
}

fn default_timezone() -> String {
    "America/Chicago".to_string()
}

#[allow(clippy::unnecessary_wraps)]
const fn default_expected_minutes() -> Option<u32> {
    Some(10)
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_classes() -> Vec<ClassConfig> {
    vec![ClassConfig {
        id: "default".to_string(),
        name: "Default class".to_string(),
        students: Vec::new(),
    }]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl Default for PassesConfig {
    fn default() -> Self {
        Self {
            default_expected_minutes: default_expected_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_class: None,
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            attendance: AttendanceConfig::default(),
            passes: PassesConfig::default(),
            classes: default_classes(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, which must exist, plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or fails
    /// validation.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::build(Some(path))
    }

    /// Load configuration from `path` if it exists, otherwise from defaults;
    /// environment overrides apply either way.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be parsed or the result
    /// fails validation.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::build(Some(path))
        } else {
            tracing::info!(path = %path.display(), "No configuration file, using defaults");
            Self::build(None)
        }
    }

    fn build(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).format(::config::FileFormat::Toml));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("HALLPASS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path` as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The configuration file path: `$HALLPASS_CONFIG` if set, otherwise
    /// `/etc/hallpass/config.toml` on Linux and the platform config
    /// directory elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if no platform config directory exists.
    pub fn default_path() -> ConfigResult<PathBuf> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(explicit));
        }
        #[cfg(target_os = "linux")]
        {
            Ok(PathBuf::from("/etc/hallpass/config.toml"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs = directories::ProjectDirs::from("", "", "hallpass")
                .ok_or(ConfigError::UnknownDirectory)?;
            Ok(dirs.config_dir().join("config.toml"))
        }
    }

    /// Validate all values, reporting the first problem found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.classes.is_empty() {
            return Err(validation("classes", "at least one class is required"));
        }

        let mut seen = HashSet::new();
        for (i, class) in self.classes.iter().enumerate() {
            if !is_valid_class_id(&class.id) {
                return Err(validation(
                    format!("classes[{i}].id"),
                    format!("'{}' must be 1-32 letters, digits, '-' or '_'", class.id),
                ));
            }
            if !seen.insert(class.id.as_str()) {
                return Err(validation(
                    format!("classes[{i}].id"),
                    format!("duplicate class id '{}'", class.id),
                ));
            }
        }

        if let Some(default) = &self.default_class {
            if !seen.contains(default.as_str()) {
                return Err(validation(
                    "default_class",
                    format!("'{default}' is not one of the configured classes"),
                ));
            }
        }

        if self.attendance.timezone.parse::<Tz>().is_err() {
            return Err(validation(
                "attendance.timezone",
                format!("'{}' is not an IANA timezone", self.attendance.timezone),
            ));
        }

        if self.passes.default_expected_minutes == Some(0) {
            return Err(validation(
                "passes.default_expected_minutes",
                "must be positive when set",
            ));
        }

        if self.passes.sweep_interval_secs == 0 {
            return Err(validation("passes.sweep_interval_secs", "must be positive"));
        }

        Ok(())
    }

    /// The attendance timezone. Falls back to UTC if unparsable, which
    /// [`Config::validate`] rules out for loaded configs.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.attendance.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    /// Id of the default class: `default_class` if set, else the first class.
    #[must_use]
    pub fn default_class_id(&self) -> &str {
        self.default_class
            .as_deref()
            .or_else(|| self.classes.first().map(|c| c.id.as_str()))
            .unwrap_or_default()
    }

    /// The class with the given id, or the default class when `id` is absent
    /// or unknown.
    #[must_use]
    pub fn class_or_default(&self, id: Option<&str>) -> Option<&ClassConfig> {
        let wanted = id.map(str::trim).filter(|s| !s.is_empty());
        if let Some(found) = wanted.and_then(|id| self.classes.iter().find(|c| c.id == id)) {
            return Some(found);
        }
        if let Some(id) = wanted {
            tracing::debug!(class_id = %id, "Unknown class id, using default class");
        }
        let default = self.default_class_id();
        self.classes.iter().find(|c| c.id == default)
    }
}

fn validation(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        message: message.into(),
    }
}

/// Returns `true` if `id` is usable as a class identifier.
#[must_use]
pub fn is_valid_class_id(id: &str) -> bool {
    CLASS_ID_RE.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_class = "P3"

[attendance]
timezone = "America/Chicago"

[passes]
default_expected_minutes = 12

[[classes]]
id = "P1"
name = "Period 1"

[[classes]]
id = "P3"
name = "Period 3"
students = [
    { s_number = "s12345", name = "Alex Rivera" },
]
"#;

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.default_class_id(), "default");
        assert_eq!(config.timezone(), chrono_tz::America::Chicago);
        assert_eq!(config.passes.default_expected_minutes, Some(10));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&write_sample(&dir)).unwrap();
        assert_eq!(config.classes.len(), 2);
        assert_eq!(config.default_class_id(), "P3");
        assert_eq!(config.passes.default_expected_minutes, Some(12));
        assert_eq!(config.passes.sweep_interval_secs, 60);
        assert_eq!(config.server.port, 5006);
        let p3 = config.class_or_default(Some("P3")).unwrap();
        assert_eq!(p3.students.len(), 1);
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.classes, default_classes());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&write_sample(&dir)).unwrap();
        let copy = dir.path().join("copy").join("config.toml");
        config.save(&copy).unwrap();
        assert_eq!(Config::load_from(&copy).unwrap(), config);
    }

    #[test]
    fn test_unknown_class_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&write_sample(&dir)).unwrap();
        assert_eq!(config.class_or_default(Some("P9")).unwrap().id, "P3");
        assert_eq!(config.class_or_default(None).unwrap().id, "P3");
        assert_eq!(config.class_or_default(Some(" P1 ")).unwrap().id, "P1");
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.default_class = Some("missing".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "default_class"
        ));

        let mut config = Config::default();
        config.attendance.timezone = "Mars/Olympus".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.classes.push(config.classes[0].clone());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.classes[0].id = "bad id!".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.passes.sweep_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.classes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_class_id_format() {
        assert!(is_valid_class_id("P3"));
        assert!(is_valid_class_id("bio-101_a"));
        assert!(!is_valid_class_id(""));
        assert!(!is_valid_class_id("has space"));
    }
}
