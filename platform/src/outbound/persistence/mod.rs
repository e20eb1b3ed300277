//! Persistence boundary: the connection pool and per-request sessions.

mod pool;
pub mod postgres;
mod session;

pub use pool::{DbPool, PoolConfig, PoolError};
pub use postgres::PgManager;
pub use session::{Session, SessionManager, UnitOfWork};
