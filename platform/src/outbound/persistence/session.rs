//! Per-request database sessions with rollback on failure.
//!
//! A [`Session`] is one pooled connection with an open transaction. It lives
//! for exactly one [`SessionManager::with_session`] scope:
//!
//! - the scope body succeeds: uncommitted work is discarded and the
//!   connection returns to the pool;
//! - the scope body fails: the transaction is rolled back, the connection is
//!   released, and the body's error is returned unchanged.
//!
//! Work survives only through an explicit [`Session::commit`].

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bb8::{ManageConnection, PooledConnection, State};
use futures_util::future::BoxFuture;
use tracing::{error, warn};

use crate::domain::Error;

use super::pool::{DbPool, PoolError};
use super::postgres::PgManager;

/// Transaction control over a single connection.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Error raised by the underlying driver.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a transaction.
    async fn begin(&mut self) -> Result<(), Self::Error>;

    /// Make the open transaction's work durable.
    async fn commit(&mut self) -> Result<(), Self::Error>;

    /// Discard the open transaction's work.
    async fn rollback(&mut self) -> Result<(), Self::Error>;
}

/// One checked-out connection with an open transaction.
pub struct Session<M: ManageConnection = PgManager> {
    conn: PooledConnection<'static, M>,
    in_transaction: bool,
}

impl<M> Session<M>
where
    M: ManageConnection,
    M::Connection: UnitOfWork,
{
    /// Mutable access to the connection for running queries.
    pub fn connection(&mut self) -> &mut M::Connection {
        &mut self.conn
    }

    /// Commit the work done so far and open the next transaction.
    ///
    /// # Errors
    ///
    /// Returns a database error when the commit or the following `BEGIN`
    /// fails. The driver error is logged, not exposed.
    pub async fn commit(&mut self) -> Result<(), Error> {
        // A failed COMMIT ends the transaction just like a successful one.
        self.in_transaction = false;
        let conn: &mut M::Connection = &mut self.conn;
        conn.commit().await.map_err(|err| {
            error!(error = %err, "commit failed");
            Error::database()
        })?;
        conn.begin().await.map_err(|err| {
            error!(error = %err, "failed to reopen transaction after commit");
            Error::database()
        })?;
        self.in_transaction = true;
        Ok(())
    }

    async fn finish(mut self, failed: bool) {
        if !self.in_transaction {
            return;
        }
        if failed {
            warn!("rolling back session after failure");
        }
        let conn: &mut M::Connection = &mut self.conn;
        if let Err(err) = conn.rollback().await {
            error!(
                error = %err,
                "rollback failed; the pool's health check decides whether the connection is reused"
            );
        }
    }
}

/// Hands out one session per scope from a shared pool.
///
/// Cheap to clone: clones share the pool. After [`close`](Self::close) every
/// clone refuses new scopes.
pub struct SessionManager<M: ManageConnection = PgManager> {
    pool: Arc<RwLock<Option<DbPool<M>>>>,
}

impl<M: ManageConnection> Clone for SessionManager<M> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<M> SessionManager<M>
where
    M: ManageConnection,
    M::Connection: UnitOfWork,
{
    /// Manage sessions drawn from `pool`.
    #[must_use]
    pub fn new(pool: DbPool<M>) -> Self {
        Self {
            pool: Arc::new(RwLock::new(Some(pool))),
        }
    }

    /// Run `f` inside a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error unchanged after rolling back, or a database error
    /// converted into `E` when no session could be opened.
    ///
    /// # Examples
    /// ```ignore
    /// use futures_util::FutureExt;
    ///
    /// let count = manager
    ///     .with_session(|session| {
    ///         async move {
    ///             let total = users.count().get_result::<i64>(session.connection()).await?;
    ///             Ok::<_, ApiError>(total)
    ///         }
    ///         .boxed()
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_session<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session<M>) -> BoxFuture<'s, Result<T, E>>,
        E: From<Error>,
    {
        let mut session = self.open().await.map_err(E::from)?;
        let outcome = f(&mut session).await;
        session.finish(outcome.is_err()).await;
        outcome
    }

    async fn open(&self) -> Result<Session<M>, Error> {
        let pool = self.current_pool().ok_or_else(|| {
            error!(error = %PoolError::Closed, "cannot open session");
            Error::database()
        })?;
        let mut conn = pool.get().await.map_err(|err| {
            error!(error = %err, "cannot open session");
            Error::database()
        })?;
        let unit: &mut M::Connection = &mut conn;
        unit.begin().await.map_err(|err| {
            error!(error = %err, "failed to begin transaction");
            Error::database()
        })?;
        Ok(Session {
            conn,
            in_transaction: true,
        })
    }

    fn current_pool(&self) -> Option<DbPool<M>> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Dispose of the pool. Safe to call more than once.
    ///
    /// Connections still checked out are closed when their scope ends.
    pub fn close(&self) {
        self.pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.current_pool().is_none()
    }

    /// Pool connection counts, or `None` once closed.
    #[must_use]
    pub fn state(&self) -> Option<State> {
        self.current_pool().map(|pool| pool.state())
    }
}

#[cfg(test)]
mod tests;
