//! Structured logging setup.
//!
//! [`init`] installs a global `tracing` subscriber with a console layer and,
//! when `save_log_files` is set, a JSON file layer at
//! `<log_directory>/<log_name>.log` rotated by size.
//! [`install_error_hooks`] routes panic and error reports into the same
//! logs.

mod hooks;
mod rotating;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::AppSettings;

pub(crate) use hooks::take_panic_report;
pub use hooks::install_error_hooks;
pub use rotating::{DEFAULT_BACKUPS, RotatingFile};

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The log directory or file could not be opened.
    #[error("failed to open log file in {path}: {source}")]
    LogFile {
        /// Directory that was being prepared.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The configured level is not a valid filter directive.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// An error report handler was already installed.
    #[error("failed to install error report hooks: {0}")]
    Hooks(#[from] color_eyre::eyre::InstallError),
}

/// Keeps the background log writer alive; flushes on drop.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct TelemetryGuard {
    file: Option<WorkerGuard>,
}

impl TelemetryGuard {
    /// Whether a file sink is active.
    #[must_use]
    pub const fn writes_files(&self) -> bool {
        self.file.is_some()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console layer plus, when enabled, the file layer and its worker guard.
///
/// # Errors
///
/// Returns [`TelemetryError::LogFile`] when the log file cannot be opened.
pub fn layers(settings: &AppSettings) -> Result<(Vec<BoxedLayer>, TelemetryGuard), TelemetryError> {
    let console: BoxedLayer = if settings.debug() {
        fmt::layer().with_target(true).boxed()
    } else {
        fmt::layer().json().with_current_span(true).boxed()
    };
    let mut layers = vec![console];
    let mut guard = TelemetryGuard::default();

    if settings.save_log_files() {
        let directory = settings.log_directory();
        let writer = RotatingFile::open(
            directory,
            &format!("{}.log", settings.log_name()),
            settings.log_file_max_bytes(),
            DEFAULT_BACKUPS,
        )
        .map_err(|source| TelemetryError::LogFile {
            path: directory.display().to_string(),
            source,
        })?;
        let (non_blocking, worker) = tracing_appender::non_blocking(writer);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_current_span(true)
                .with_writer(non_blocking)
                .boxed(),
        );
        guard.file = Some(worker);
    }

    Ok((layers, guard))
}

/// Filter honouring `RUST_LOG` first, then the configured level.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the fallback directive is
/// rejected.
pub fn filter(settings: &AppSettings) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.log_level().as_filter()))
        .map_err(|err| TelemetryError::Filter(err.to_string()))
}

/// Install the global subscriber.
///
/// A second call keeps the first subscriber and logs a warning.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the file sink or filter cannot be built.
pub fn init(settings: &AppSettings) -> Result<TelemetryGuard, TelemetryError> {
    let (layers, guard) = layers(settings)?;
    let filter = filter(settings)?;
    if let Err(error) = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
    {
        warn!(%error, "tracing subscriber already installed");
    }
    Ok(guard)
}
