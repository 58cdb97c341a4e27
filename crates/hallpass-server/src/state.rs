//! Application state shared across handlers.
//!
//! Handlers never hold a lock across a request. The state machine and
//! attendance book are cheap clones around `Arc`s, and per-student
//! uniqueness is enforced inside the repository.

use std::path::PathBuf;
use std::sync::Arc;

use hallpass_core::{
    default_data_dir, default_database_path, AttendanceBook, AttendanceRepository, Clock,
    Config, HallPassError, PassManager, PassRepository, PhotoStore, SqliteStore, Sweeper,
    SystemClock,
};
use tracing::info;

/// State handed to every handler.
pub type SharedState = Arc<AppState>;

/// Shared application state.
pub struct AppState {
    /// Loaded configuration; read-only while serving.
    pub config: Config,
    /// Hall pass state machine.
    pub passes: PassManager,
    /// Daily check-in.
    pub attendance: AttendanceBook,
    /// Overdue sweeper, also run in the background by `main`.
    pub sweeper: Sweeper,
    /// Photo directory served under `/photos`.
    pub photos: PhotoStore,
}

impl AppState {
    /// Open the configured SQLite database and photo directory and wire up
    /// the core services on the wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or the
    /// database cannot be opened.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let database_path = match &config.storage.database_path {
            Some(path) => path.clone(),
            None => default_database_path()?,
        };
        let photos_dir = match &config.storage.photos_dir {
            Some(path) => path.clone(),
            None => default_data_dir()?.join("photos"),
        };

        info!(database = %database_path.display(), photos = %photos_dir.display(), "Opening storage");
        let store = Arc::new(SqliteStore::open(&database_path)?);
        Ok(Self::with_store(config, store, Arc::new(SystemClock), photos_dir))
    }

    /// Wire up the core services on an existing store and clock.
    pub fn with_store<S>(
        config: Config,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        photos_dir: impl Into<PathBuf>,
    ) -> Self
    where
        S: PassRepository + AttendanceRepository + 'static,
    {
        let timezone = config.timezone();
        let photos = PhotoStore::new(photos_dir);
        let pass_repo: Arc<dyn PassRepository> = store.clone();
        let attendance_repo: Arc<dyn AttendanceRepository> = store;

        Self {
            passes: PassManager::new(pass_repo.clone(), clock.clone(), photos.clone(), timezone),
            attendance: AttendanceBook::new(attendance_repo, clock.clone(), photos.clone(), timezone),
            sweeper: Sweeper::new(pass_repo, clock),
            photos,
            config,
        }
    }

    /// Wrap in an [`Arc`] for the router.
    #[must_use]
    pub fn into_shared(self) -> SharedState {
        Arc::new(self)
    }
}

/// Run blocking core work off the async executor.
///
/// # Errors
///
/// Returns the closure's error, or [`HallPassError::Storage`] if the
/// blocking task panicked.
pub async fn run_blocking<T, F>(state: &SharedState, f: F) -> hallpass_core::Result<T>
where
    F: FnOnce(&AppState) -> hallpass_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| HallPassError::Storage(format!("blocking task failed: {e}")))?
}
