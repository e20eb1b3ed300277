//! PostgreSQL wiring through diesel-async.

use async_trait::async_trait;
use diesel::ConnectionResult;
use diesel::connection::InstrumentationEvent;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};
use diesel_async::{AnsiTransactionManager, AsyncConnection, AsyncPgConnection, TransactionManager};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::debug;

use super::pool::PoolConfig;
use super::session::UnitOfWork;

/// Connection manager used by the production pool.
pub type PgManager = AsyncDieselConnectionManager<AsyncPgConnection>;

/// Log target for echoed SQL statements.
pub const SQL_LOG_TARGET: &str = "platform_kit::sql";

/// Build the manager for `config`, echoing statements when requested.
#[must_use]
pub fn manager(config: &PoolConfig) -> PgManager {
    if !config.echo() {
        return PgManager::new(config.database_url());
    }

    let mut manager_config = ManagerConfig::<AsyncPgConnection>::default();
    manager_config.custom_setup = Box::new(establish_with_echo);
    PgManager::new_with_config(config.database_url(), manager_config)
}

fn establish_with_echo(url: &str) -> BoxFuture<'_, ConnectionResult<AsyncPgConnection>> {
    async move {
        let mut conn = AsyncPgConnection::establish(url).await?;
        conn.set_instrumentation(log_statement);
        Ok(conn)
    }
    .boxed()
}

fn log_statement(event: InstrumentationEvent<'_>) {
    if let InstrumentationEvent::StartQuery { query, .. } = event {
        debug!(target: SQL_LOG_TARGET, %query, "executing statement");
    }
}

#[async_trait]
impl UnitOfWork for AsyncPgConnection {
    type Error = diesel::result::Error;

    async fn begin(&mut self) -> Result<(), Self::Error> {
        <AnsiTransactionManager as TransactionManager<Self>>::begin_transaction(self).await
    }

    async fn commit(&mut self) -> Result<(), Self::Error> {
        <AnsiTransactionManager as TransactionManager<Self>>::commit_transaction(self).await
    }

    async fn rollback(&mut self) -> Result<(), Self::Error> {
        <AnsiTransactionManager as TransactionManager<Self>>::rollback_transaction(self).await
    }
}
