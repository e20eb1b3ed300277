//! Liveness and readiness probes.

use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::http::header;
use actix_web::{HttpResponse, HttpResponseBuilder, web};
use bb8::ManageConnection;
use futures_util::FutureExt;

use platform_kit::outbound::persistence::UnitOfWork;
use platform_kit::{ApiResult, Error, SessionManager};

/// Whether the process should report itself alive.
///
/// Cleared before graceful shutdown so orchestrators stop routing traffic.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            live: AtomicBool::new(true),
        }
    }
}

impl HealthState {
    /// Flag the service as draining.
    pub fn mark_unhealthy(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Liveness state.
    pub fn is_alive(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

fn no_store(mut builder: HttpResponseBuilder) -> HttpResponse {
    builder
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

/// 200 while alive, 503 once draining.
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    if state.is_alive() {
        no_store(HttpResponse::Ok())
    } else {
        no_store(HttpResponse::ServiceUnavailable())
    }
}

/// 200 when a database session can be opened, 503 otherwise.
pub async fn ready<M>(sessions: web::Data<SessionManager<M>>) -> ApiResult<HttpResponse>
where
    M: ManageConnection,
    M::Connection: UnitOfWork,
{
    sessions
        .with_session(|_session| async { Ok::<_, Error>(()) }.boxed())
        .await
        .map_err(|_| {
            Error::service_unavailable()
                .with_detail("dependency", "database")
                .with_header(header::CACHE_CONTROL.as_str(), "no-store")
        })?;
    Ok(no_store(HttpResponse::Ok()))
}
