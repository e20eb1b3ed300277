//! Application settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `APP_*` environment variables and config
//! files. [`AppSettings::from_process`] loads a `.env` file first. The
//! loaded struct is validated once and then shared read-only through
//! [`crate::AppContext`].

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use pagination::MAX_PAGE_LIMIT;

const DEFAULT_LOG_NAME: &str = "platform_app";
const DEFAULT_LOG_DIRECTORY: &str = "logs";
const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Errors raised while loading or validating settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The layered sources could not be merged.
    #[error("failed to load settings: {0}")]
    Load(String),
    /// A required value is absent or empty.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    /// A value is present but unusable.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Offending setting.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Minimum severity written to the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything, including per-request timing.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Suspicious but handled conditions.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            other => Err(ConfigError::Invalid {
                field: "log_level",
                reason: format!("unknown level `{other}`"),
            }),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_filter().to_ascii_uppercase())
    }
}

/// Settings shared by every part of a service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "APP")]
pub struct AppSettings {
    /// PostgreSQL connection URL. Required.
    pub database_url: Option<String>,
    /// Log every SQL statement. Off when unset.
    pub db_echo: Option<bool>,
    /// Connections kept open.
    #[ortho_config(default = 20)]
    pub db_pool_size: u32,
    /// Extra connections allowed under load.
    #[ortho_config(default = 10)]
    pub db_max_overflow: u32,
    /// Service name. Required.
    pub app_name: Option<String>,
    /// Human-readable console logs and verbose request timing. Off when
    /// unset.
    pub debug: Option<bool>,
    /// Base name of the log file.
    pub log_name: Option<String>,
    /// DEBUG, INFO, WARN or ERROR.
    pub log_level: Option<String>,
    /// Rotate the log file after this many MiB.
    #[ortho_config(default = 10)]
    pub log_file_size_mb: u64,
    /// Directory holding log files.
    pub log_directory: Option<PathBuf>,
    /// Write logs to files as well as the console. On when unset.
    pub save_log_files: Option<bool>,
    /// Upper bound for pagination `limit`.
    pub max_page_limit: Option<u64>,
}

impl AppSettings {
    /// Load `.env`, then CLI arguments, environment and config files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn from_process() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        Self::load_from_args(std::env::args_os())
    }

    /// Load from explicit CLI arguments plus environment and config files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let settings =
            Self::load_from_iter(args).map_err(|err| ConfigError::Load(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field rules that the loader cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.as_deref().is_none_or(|url| url.trim().is_empty()) {
            return Err(ConfigError::Missing("database_url"));
        }
        if self.app_name.as_deref().is_none_or(|name| name.trim().is_empty()) {
            return Err(ConfigError::Missing("app_name"));
        }
        if self.db_pool_size == 0 {
            return Err(ConfigError::Invalid {
                field: "db_pool_size",
                reason: "must be at least 1".to_owned(),
            });
        }
        if let Some(raw) = &self.log_level {
            raw.parse::<LogLevel>()?;
        }
        Ok(())
    }

    /// Database URL; empty only if [`validate`](Self::validate) was skipped.
    #[must_use]
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or_default()
    }

    /// Service name; empty only if [`validate`](Self::validate) was skipped.
    #[must_use]
    pub fn app_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or_default()
    }

    /// Configured log level, INFO when unset.
    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    /// Whether SQL statements are logged.
    #[must_use]
    pub fn db_echo(&self) -> bool {
        self.db_echo.unwrap_or(false)
    }

    /// Whether debug mode is on.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    /// Whether logs are also written to files.
    #[must_use]
    pub fn save_log_files(&self) -> bool {
        self.save_log_files.unwrap_or(true)
    }

    /// Log file base name.
    #[must_use]
    pub fn log_name(&self) -> &str {
        self.log_name.as_deref().unwrap_or(DEFAULT_LOG_NAME)
    }

    /// Directory holding log files.
    #[must_use]
    pub fn log_directory(&self) -> &Path {
        self.log_directory
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_LOG_DIRECTORY))
    }

    /// Full path of the active log file.
    #[must_use]
    pub fn log_file_path(&self) -> PathBuf {
        self.log_directory().join(format!("{}.log", self.log_name()))
    }

    /// Rotation threshold in bytes.
    #[must_use]
    pub const fn log_file_max_bytes(&self) -> u64 {
        self.log_file_size_mb.saturating_mul(BYTES_PER_MIB)
    }

    /// Upper bound for pagination `limit`.
    #[must_use]
    pub fn max_page_limit(&self) -> u64 {
        self.max_page_limit.unwrap_or(MAX_PAGE_LIMIT)
    }

    /// Whether every request should be logged with its timing.
    #[must_use]
    pub fn verbose_timing(&self) -> bool {
        self.debug() && self.log_level() == LogLevel::Debug
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing and validation.

    use super::*;
    use crate::test_support::settings::test_settings;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 12] = [
        "APP_DATABASE_URL",
        "APP_DB_ECHO",
        "APP_DB_POOL_SIZE",
        "APP_DB_MAX_OVERFLOW",
        "APP_APP_NAME",
        "APP_DEBUG",
        "APP_LOG_NAME",
        "APP_LOG_LEVEL",
        "APP_LOG_FILE_SIZE_MB",
        "APP_LOG_DIRECTORY",
        "APP_SAVE_LOG_FILES",
        "APP_MAX_PAGE_LIMIT",
    ];

    fn env_with(overrides: &[(&'static str, &str)]) -> Vec<(&'static str, Option<String>)> {
        VARS.iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| (*value).to_owned());
                (*name, value)
            })
            .collect()
    }

    fn load() -> Result<AppSettings, ConfigError> {
        AppSettings::load_from_args([OsString::from("platform")])
    }

    #[rstest]
    fn defaults_fill_optional_values() {
        let _guard = lock_env(env_with(&[
            ("APP_DATABASE_URL", "postgres://localhost/app"),
            ("APP_APP_NAME", "orders"),
        ]));

        let settings = load().expect("settings load");
        assert_eq!(settings.database_url(), "postgres://localhost/app");
        assert_eq!(settings.app_name(), "orders");
        assert!(!settings.db_echo());
        assert_eq!(settings.db_pool_size, 20);
        assert_eq!(settings.db_max_overflow, 10);
        assert!(!settings.debug());
        assert_eq!(settings.log_name(), DEFAULT_LOG_NAME);
        assert_eq!(settings.log_level(), LogLevel::Info);
        assert_eq!(settings.log_file_max_bytes(), 10 * BYTES_PER_MIB);
        assert_eq!(settings.log_directory(), Path::new("logs"));
        assert!(settings.save_log_files());
        assert_eq!(settings.max_page_limit(), 1000);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(env_with(&[
            ("APP_DATABASE_URL", "postgres://db/app"),
            ("APP_APP_NAME", "billing"),
            ("APP_DB_ECHO", "true"),
            ("APP_DB_POOL_SIZE", "5"),
            ("APP_DB_MAX_OVERFLOW", "0"),
            ("APP_DEBUG", "true"),
            ("APP_LOG_NAME", "billing"),
            ("APP_LOG_LEVEL", "debug"),
            ("APP_LOG_DIRECTORY", "/var/log/billing"),
            ("APP_SAVE_LOG_FILES", "false"),
            ("APP_MAX_PAGE_LIMIT", "50"),
        ]));

        let settings = load().expect("settings load");
        assert!(settings.db_echo());
        assert!(settings.debug());
        assert_eq!(settings.db_pool_size, 5);
        assert_eq!(settings.db_max_overflow, 0);
        assert_eq!(settings.log_level(), LogLevel::Debug);
        assert_eq!(
            settings.log_file_path(),
            PathBuf::from("/var/log/billing/billing.log")
        );
        assert!(!settings.save_log_files());
        assert_eq!(settings.max_page_limit(), 50);
        assert!(settings.verbose_timing());
    }

    #[rstest]
    fn missing_database_url_is_rejected() {
        let _guard = lock_env(env_with(&[("APP_APP_NAME", "orders")]));
        assert_eq!(load().unwrap_err(), ConfigError::Missing("database_url"));
    }

    #[rstest]
    #[case("APP_LOG_LEVEL", "chatty", "log_level")]
    #[case("APP_DB_POOL_SIZE", "0", "db_pool_size")]
    fn invalid_values_are_rejected(
        #[case] var: &'static str,
        #[case] value: &str,
        #[case] field: &str,
    ) {
        let _guard = lock_env(env_with(&[
            ("APP_DATABASE_URL", "postgres://localhost/app"),
            ("APP_APP_NAME", "orders"),
            (var, value),
        ]));
        match load() {
            Err(ConfigError::Invalid { field: got, .. }) => assert_eq!(got, field),
            other => panic!("expected invalid {field}, got {other:?}"),
        }
    }

    #[rstest]
    #[case("DEBUG", LogLevel::Debug)]
    #[case("info", LogLevel::Info)]
    #[case("Warning", LogLevel::Warn)]
    #[case(" ERROR ", LogLevel::Error)]
    fn log_levels_parse_case_insensitively(#[case] raw: &str, #[case] expected: LogLevel) {
        assert_eq!(raw.parse::<LogLevel>(), Ok(expected));
    }

    #[rstest]
    #[case(false, Some("DEBUG"), false)]
    #[case(true, Some("INFO"), false)]
    #[case(true, Some("DEBUG"), true)]
    fn verbose_timing_needs_debug_flag_and_level(
        #[case] debug: bool,
        #[case] level: Option<&str>,
        #[case] expected: bool,
    ) {
        let mut settings = test_settings();
        settings.debug = Some(debug);
        settings.log_level = level.map(str::to_owned);
        assert_eq!(settings.verbose_timing(), expected);
    }
}
