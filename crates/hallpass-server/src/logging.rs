//! Logging initialization.
//!
//! - **Production** (`HALLPASS_ENV=production`): JSON lines to a daily rolling
//!   file plus compact stdout for the service journal
//! - **Development**: pretty stdout with span events
//!
//! The filter comes from `RUST_LOG` when set, else `HALLPASS_LOG_LEVEL`,
//! else `info`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the logging mode.
pub const ENV_VAR: &str = "HALLPASS_ENV";

/// Environment variable holding the fallback filter directive.
pub const LEVEL_VAR: &str = "HALLPASS_LOG_LEVEL";

/// Environment variable overriding the log directory.
pub const DIR_VAR: &str = "HALLPASS_LOG_DIR";

// Non-blocking writers flush on drop; keep them for the life of the process.
static GUARDS: OnceLock<Vec<WorkerGuard>> = OnceLock::new();

/// Output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// JSON file plus compact stdout.
    Production,
    /// Pretty stdout.
    Development,
}

impl LogMode {
    /// Pick the mode from the value of [`ENV_VAR`].
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") || v.eq_ignore_ascii_case("prod") => {
                Self::Production
            }
            _ => Self::Development,
        }
    }

    /// Read the mode from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(ENV_VAR).ok().as_deref())
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive cannot be parsed or a global
/// subscriber is already installed.
pub fn init(mode: LogMode) -> anyhow::Result<()> {
    let fallback = std::env::var(LEVEL_VAR).unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&fallback))?;

    match mode {
        LogMode::Production => init_production(env_filter),
        LogMode::Development => init_development(env_filter),
    }
}

fn init_production(env_filter: EnvFilter) -> anyhow::Result<()> {
    let log_dir = log_directory();
    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let mut guards = vec![stdout_guard];

    let (file_layer, file_error) = match open_log_file(&log_dir) {
        Ok(appender) => {
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guards.push(file_guard);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;
    let _ = GUARDS.set(guards);

    if let Some(e) = file_error {
        tracing::warn!(dir = %log_dir.display(), error = %e, "File logging disabled");
    }
    Ok(())
}

fn open_log_file(log_dir: &Path) -> anyhow::Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("hallpass")
        .filename_suffix("log")
        .build(log_dir)?;
    Ok(appender)
}

fn init_development(env_filter: EnvFilter) -> anyhow::Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()?;
    Ok(())
}

/// Log directory: [`DIR_VAR`] if set, else `/var/log/hallpass` on Linux and
/// the platform data directory elsewhere.
fn log_directory() -> PathBuf {
    if let Ok(dir) = std::env::var(DIR_VAR) {
        return PathBuf::from(dir);
    }
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/hallpass")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "hallpass")
            .map(|dirs| dirs.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("./logs"))
    }
}
