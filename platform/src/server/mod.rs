//! Demo server wiring.

pub mod health;
pub mod items;

use std::net::SocketAddr;

use actix_web::body::BoxBody;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use bb8::ManageConnection;

use platform_kit::AppContext;
use platform_kit::middleware;
use platform_kit::outbound::persistence::UnitOfWork;

use health::{HealthState, live, ready};
use items::{create_item, get_item, list_items};

/// Build the demo application around `context`.
pub fn build_app<M>(
    context: &AppContext<M>,
    health_state: web::Data<HealthState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<BoxBody>,
        Error = actix_web::Error,
        InitError = (),
    > + use<M>,
>
where
    M: ManageConnection,
    M::Connection: UnitOfWork,
{
    let api = web::scope("/api/v1")
        .route("/items", web::get().to(list_items))
        .route("/items", web::post().to(create_item))
        .route("/items/{id}", web::get().to(get_item));

    middleware::install(App::new(), context)
        .app_data(health_state)
        .route("/health/live", web::get().to(live))
        .route("/health/ready", web::get().to(ready::<M>))
        .service(api)
}

/// Start serving on `bind_addr`.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when the socket cannot be bound.
pub fn create_server(
    context: web::Data<AppContext>,
    health_state: web::Data<HealthState>,
    bind_addr: SocketAddr,
) -> std::io::Result<Server> {
    let server = HttpServer::new(move || build_app(context.get_ref(), health_state.clone()))
        .bind(bind_addr)?
        .run();
    Ok(server)
}
