//! Application context shared by every request.
//!
//! Built once at startup and handed to the server explicitly.

use std::sync::Arc;

use bb8::ManageConnection;
use tracing::info;

use crate::config::AppSettings;
use crate::outbound::persistence::{
    DbPool, PgManager, PoolConfig, PoolError, SessionManager, UnitOfWork,
};
use crate::middleware::SlowRequestPolicy;
use crate::telemetry::{self, TelemetryError, TelemetryGuard};

/// Failures while bootstrapping the context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Logging could not be set up.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The database pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Settings, session manager and log sink for one running service.
pub struct AppContext<M: ManageConnection = PgManager> {
    settings: Arc<AppSettings>,
    sessions: SessionManager<M>,
    telemetry: Option<TelemetryGuard>,
}

impl AppContext<PgManager> {
    /// Install logging, then connect the PostgreSQL pool.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the log sink or the pool cannot be
    /// created.
    pub async fn bootstrap(settings: AppSettings) -> Result<Self, ContextError> {
        let guard = telemetry::init(&settings)?;
        let pool = DbPool::connect(&PoolConfig::from_settings(&settings)).await?;
        info!(
            app = settings.app_name(),
            pool_size = settings.db_pool_size,
            max_overflow = settings.db_max_overflow,
            "application context ready"
        );
        Ok(Self::new(settings, SessionManager::new(pool)).with_telemetry(guard))
    }
}

impl<M: ManageConnection> AppContext<M> {
    /// Context over an existing session manager. Logging is left as is.
    #[must_use]
    pub fn new(settings: AppSettings, sessions: SessionManager<M>) -> Self {
        Self {
            settings: Arc::new(settings),
            sessions,
            telemetry: None,
        }
    }

    /// Keep `guard` alive for as long as the context.
    #[must_use]
    pub fn with_telemetry(mut self, guard: TelemetryGuard) -> Self {
        self.telemetry = Some(guard);
        self
    }

    /// The loaded settings.
    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub(crate) fn settings_arc(&self) -> Arc<AppSettings> {
        Arc::clone(&self.settings)
    }

    /// The per-request session manager.
    #[must_use]
    pub const fn sessions(&self) -> &SessionManager<M> {
        &self.sessions
    }

    /// Slow-request reporting derived from the settings.
    #[must_use]
    pub fn slow_request_policy(&self) -> SlowRequestPolicy {
        SlowRequestPolicy::from_settings(&self.settings)
    }

    /// Largest page size handlers should serve.
    #[must_use]
    pub fn page_cap(&self) -> u64 {
        self.settings.max_page_limit()
    }

    /// Close the pool and flush the log sink.
    pub fn shutdown(self)
    where
        M::Connection: UnitOfWork,
    {
        self.sessions.close();
        info!("application context shut down");
        drop(self.telemetry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory::MemoryManager;
    use crate::test_support::settings::test_settings;
    use std::time::Duration;

    async fn memory_context() -> AppContext<MemoryManager> {
        let settings = test_settings();
        let pool = DbPool::build(&PoolConfig::from_settings(&settings), MemoryManager::default())
            .await
            .expect("memory pool");
        AppContext::new(settings, SessionManager::new(pool))
    }

    #[tokio::test]
    async fn accessors_reflect_settings() {
        let ctx = memory_context().await;
        assert_eq!(ctx.settings().app_name(), "platform-test");
        assert_eq!(ctx.page_cap(), 1000);
        assert!(!ctx.slow_request_policy().should_report(Duration::from_millis(5)));
        assert!(ctx.telemetry.is_none());
    }

    #[tokio::test]
    async fn shutdown_closes_the_pool() {
        let ctx = memory_context().await;
        let sessions = ctx.sessions().clone();
        assert!(!sessions.is_closed());
        ctx.shutdown();
        assert!(sessions.is_closed());
    }
}
