//! Shared building blocks for actix-web backends.
//!
//! Settings loading, typed HTTP errors with a uniform JSON envelope, the
//! request middleware pipeline, per-request database sessions, entity field
//! groups and small helpers.

pub mod config;
pub mod context;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod utils;

pub use config::{AppSettings, ConfigError};
pub use context::{AppContext, ContextError};
pub use domain::{Error, ErrorCode, RequestId};
pub use inbound::http::{ApiError, ApiResult};
pub use outbound::persistence::{Session, SessionManager};
