//! Demo service: loads settings, builds the application context and serves
//! the sample endpoints through the platform pipeline.

mod server;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::web;
use tracing::{info, warn};

use platform_kit::{AppContext, AppSettings, telemetry};
use server::create_server;
use server::health::HealthState;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::install_error_hooks().map_err(std::io::Error::other)?;
    let settings = AppSettings::from_process().map_err(std::io::Error::other)?;
    let context = AppContext::bootstrap(settings)
        .await
        .map_err(std::io::Error::other)?;

    let bind = env::var("PLATFORM_DEMO_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_owned());
    let bind_addr: SocketAddr = bind.parse().map_err(|err| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid bind address {bind}: {err}"),
        )
    })?;

    let context = web::Data::new(context);
    let health_state = web::Data::new(HealthState::default());
    let server = create_server(context.clone(), health_state.clone(), bind_addr)?;
    info!(%bind_addr, app = context.settings().app_name(), "server listening");

    let outcome = server.await;
    health_state.mark_unhealthy();
    match Arc::try_unwrap(context.into_inner()) {
        Ok(owned) => owned.shutdown(),
        Err(shared) => shared.sessions().close(),
    }
    if let Err(error) = &outcome {
        warn!(%error, "server stopped with an error");
    }
    outcome
}
